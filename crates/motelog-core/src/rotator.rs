//! Per-device CSV persistence with time-based rotation.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta};
use tracing::info;

use motelog_types::{DeviceIdentity, TelemetryRecord};

use crate::error::{Error, Result};

/// Column header written at the top of every log file.
pub const CSV_HEADER: &str =
    "Date,Time,DeviceName,accel.X,accel.Y,accel.Z,gyro.X,gyro.Y,gyro.Z,temp.O,temp.A,battery.V";

/// Default rotation period: one hour.
pub const DEFAULT_ROTATION_PERIOD: Duration = Duration::from_secs(3600);

/// One open append target: a log file plus the time it was opened.
struct LogTarget {
    writer: BufWriter<File>,
    path: PathBuf,
    opened_at: DateTime<Local>,
}

/// Appends telemetry rows for one device, rotating to a fresh file once
/// the current one is older than the rotation period.
///
/// Rotation is decided from each record's own timestamp, so every row in
/// a file falls inside that file's `[opened_at, opened_at + period)`
/// window and no record crosses a rotation boundary into the wrong file.
/// A target is always replaced, never reused: the old file is closed and
/// a new one opened with the header rewritten.
///
/// Each row is flushed as soon as it is written, so a crash loses at most
/// the in-flight row.
pub struct RotatingCsvWriter {
    root: PathBuf,
    device: DeviceIdentity,
    period: TimeDelta,
    current: Option<LogTarget>,
}

impl RotatingCsvWriter {
    /// Create a writer rooted at `root` for one device.
    ///
    /// Nothing touches the filesystem until the first
    /// [`write`](Self::write); a session that never receives a complete
    /// message leaves no file behind.
    pub fn new(root: impl Into<PathBuf>, device: DeviceIdentity, period: Duration) -> Self {
        Self {
            root: root.into(),
            device,
            period: TimeDelta::from_std(period).unwrap_or(TimeDelta::MAX),
            current: None,
        }
    }

    /// Append one record, opening or rotating the target first as needed.
    pub fn write(&mut self, record: &TelemetryRecord) -> Result<()> {
        let needs_fresh_target = match &self.current {
            None => true,
            Some(target) => record.timestamp.signed_duration_since(target.opened_at) >= self.period,
        };
        if needs_fresh_target {
            self.open_target(record.timestamp)?;
        }

        let Some(target) = self.current.as_mut() else {
            return Err(Error::storage(
                &self.root,
                std::io::Error::other("no open log target"),
            ));
        };
        writeln!(target.writer, "{}", format_row(record))
            .map_err(|e| Error::storage(&target.path, e))?;
        target
            .writer
            .flush()
            .map_err(|e| Error::storage(&target.path, e))
    }

    /// Path of the currently open log file, if any.
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|t| t.path.as_path())
    }

    fn open_target(&mut self, opened_at: DateTime<Local>) -> Result<()> {
        if let Some(old) = self.current.take() {
            // rows are flushed individually; dropping closes the file
            info!(
                device = %self.device,
                path = %old.path.display(),
                "rotating log file"
            );
        }

        let dir = self.root.join(self.device.storage_key());
        fs::create_dir_all(&dir).map_err(|e| Error::storage(&dir, e))?;

        let path = dir.join(format!(
            "{}_{}.csv",
            self.device.storage_key(),
            opened_at.format("%Y%m%d_%H%M%S"),
        ));
        let file = File::create(&path).map_err(|e| Error::storage(&path, e))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{CSV_HEADER}").map_err(|e| Error::storage(&path, e))?;
        writer.flush().map_err(|e| Error::storage(&path, e))?;

        info!(device = %self.device, path = %path.display(), "opened log file");
        self.current = Some(LogTarget {
            writer,
            path,
            opened_at,
        });
        Ok(())
    }
}

/// Format one record as a CSV row matching [`CSV_HEADER`].
///
/// Absent fields become empty cells, never zeros.
fn format_row(record: &TelemetryRecord) -> String {
    let mut cells: Vec<String> = Vec::with_capacity(12);
    cells.push(record.timestamp.format("%Y-%m-%d").to_string());
    cells.push(record.timestamp.format("%H:%M:%S%.3f").to_string());
    cells.push(csv_escape(&record.device.name));

    match &record.motion {
        Some(m) => {
            for value in m.accel.iter().chain(m.gyro.iter()) {
                cells.push(value.to_string());
            }
        }
        None => cells.extend(std::iter::repeat_n(String::new(), 6)),
    }
    match &record.power {
        Some(p) => {
            cells.push(p.temperatures[0].to_string());
            cells.push(p.temperatures[1].to_string());
            cells.push(p.battery_volts.to_string());
        }
        None => cells.extend(std::iter::repeat_n(String::new(), 3)),
    }

    cells.join(",")
}

/// Escape a value for CSV output.
///
/// Wraps the value in quotes if it contains commas, quotes, or newlines;
/// double quotes are escaped by doubling them.
fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use motelog_types::{MotionSample, PowerSample};

    fn device() -> DeviceIdentity {
        DeviceIdentity::new("AA:BB:CC:DD:EE:FF", "LAB_NODE_01")
    }

    fn at(hour: u32, min: u32, sec: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 14, hour, min, sec).unwrap()
    }

    fn record(timestamp: DateTime<Local>) -> TelemetryRecord {
        TelemetryRecord {
            device: device(),
            timestamp,
            motion: Some(MotionSample {
                accel: [1.0, 2.0, 3.0],
                gyro: [4.0, 5.0, 6.0],
            }),
            power: None,
        }
    }

    #[test]
    fn first_write_creates_file_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer =
            RotatingCsvWriter::new(dir.path(), device(), DEFAULT_ROTATION_PERIOD);
        writer.write(&record(at(10, 0, 0))).unwrap();

        let path = writer.current_path().unwrap().to_path_buf();
        assert!(path.starts_with(dir.path().join(device().storage_key())));

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("2026-03-14,10:00:00.000,LAB_NODE_01,1,2,3,4,5,6,,,"));
    }

    #[test]
    fn rows_land_in_the_window_they_belong_to() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RotatingCsvWriter::new(dir.path(), device(), Duration::from_secs(3600));

        // three rows inside the first hour, two after the boundary
        let timestamps = [
            at(10, 0, 0),
            at(10, 20, 0),
            at(10, 59, 59),
            at(11, 0, 0),
            at(11, 30, 0),
        ];
        let mut paths = Vec::new();
        for ts in timestamps {
            writer.write(&record(ts)).unwrap();
            paths.push(writer.current_path().unwrap().to_path_buf());
        }

        assert_eq!(paths[0], paths[1]);
        assert_eq!(paths[1], paths[2]);
        assert_ne!(paths[2], paths[3]);
        assert_eq!(paths[3], paths[4]);

        let first = fs::read_to_string(&paths[0]).unwrap();
        let second = fs::read_to_string(&paths[3]).unwrap();
        // every row in exactly one file, in original order
        assert_eq!(first.lines().count(), 4);
        assert_eq!(second.lines().count(), 3);
        assert!(second.lines().nth(1).unwrap().contains("11:00:00"));
        assert!(first.lines().last().unwrap().contains("10:59:59"));
    }

    #[test]
    fn rotation_rewrites_header() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RotatingCsvWriter::new(dir.path(), device(), Duration::from_secs(60));
        writer.write(&record(at(10, 0, 0))).unwrap();
        writer.write(&record(at(10, 1, 0))).unwrap();

        let content = fs::read_to_string(writer.current_path().unwrap()).unwrap();
        assert_eq!(content.lines().next().unwrap(), CSV_HEADER);
    }

    #[test]
    fn absent_fields_are_blank_cells() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer =
            RotatingCsvWriter::new(dir.path(), device(), DEFAULT_ROTATION_PERIOD);

        let rec = TelemetryRecord {
            device: device(),
            timestamp: at(9, 30, 0),
            motion: None,
            power: Some(PowerSample {
                battery_volts: 3.7,
                temperatures: [20.0, 21.0],
            }),
        };
        writer.write(&rec).unwrap();

        let content = fs::read_to_string(writer.current_path().unwrap()).unwrap();
        let row = content.lines().nth(1).unwrap();
        assert!(row.ends_with(",,,,,,20,21,3.7"));
    }

    #[test]
    fn fully_blank_record_still_produces_a_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer =
            RotatingCsvWriter::new(dir.path(), device(), DEFAULT_ROTATION_PERIOD);
        writer
            .write(&TelemetryRecord::empty(device(), at(9, 0, 0)))
            .unwrap();

        let content = fs::read_to_string(writer.current_path().unwrap()).unwrap();
        let row = content.lines().nth(1).unwrap();
        assert_eq!(row.split(',').count(), 12);
        assert!(row.ends_with(",,,,,,,,,"));
    }

    #[test]
    fn device_names_with_commas_are_escaped() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn same_name_different_address_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let twin_a = DeviceIdentity::new("AA:00", "NODE");
        let twin_b = DeviceIdentity::new("BB:00", "NODE");

        let mut writer_a =
            RotatingCsvWriter::new(dir.path(), twin_a, DEFAULT_ROTATION_PERIOD);
        let mut writer_b =
            RotatingCsvWriter::new(dir.path(), twin_b.clone(), DEFAULT_ROTATION_PERIOD);

        writer_a
            .write(&TelemetryRecord::empty(writer_a.device.clone(), at(8, 0, 0)))
            .unwrap();
        writer_b
            .write(&TelemetryRecord::empty(twin_b, at(8, 0, 0)))
            .unwrap();

        assert_ne!(
            writer_a.current_path().unwrap(),
            writer_b.current_path().unwrap()
        );
    }
}
