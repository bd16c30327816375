//! Delimiter framing of the notification byte stream.

/// Accumulates raw notification bytes for one device and yields complete
/// messages on a single delimiter character.
///
/// Each session owns exactly one framer; it is created when the session
/// becomes active and discarded on disconnect, so partial messages never
/// leak between connections or devices.
///
/// The buffer is unbounded: if the peer never emits a delimiter it grows
/// with every notification. Mote firmware delimits every reading, so the
/// residual stays small in practice; [`pending`](Self::pending) exposes
/// the residual size so callers can log it.
#[derive(Debug)]
pub struct MessageFramer {
    buffer: String,
    delimiter: char,
}

impl MessageFramer {
    /// Create a framer splitting on `delimiter`.
    pub fn new(delimiter: char) -> Self {
        Self {
            buffer: String::new(),
            delimiter,
        }
    }

    /// Append raw bytes and iterate the complete messages they unlock.
    ///
    /// The bytes are decoded as UTF-8 text (invalid sequences are
    /// replaced). The returned iterator is lazy: each step yields the
    /// prefix before the next delimiter and removes prefix and delimiter
    /// from the buffer. Whatever remains after the last delimiter — the
    /// partial next message — stays buffered for the following call.
    pub fn feed(&mut self, raw: &[u8]) -> Messages<'_> {
        self.buffer.push_str(&String::from_utf8_lossy(raw));
        Messages { framer: self }
    }

    /// Number of buffered bytes still awaiting a delimiter.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Iterator over complete messages extracted by [`MessageFramer::feed`].
#[derive(Debug)]
pub struct Messages<'a> {
    framer: &'a mut MessageFramer,
}

impl Iterator for Messages<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let pos = self.framer.buffer.find(self.framer.delimiter)?;
        let message = self.framer.buffer[..pos].to_string();
        self.framer
            .buffer
            .drain(..pos + self.framer.delimiter.len_utf8());
        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framer() -> MessageFramer {
        MessageFramer::new('_')
    }

    #[test]
    fn no_delimiter_yields_nothing_and_buffers() {
        let mut f = framer();
        assert_eq!(f.feed(b"A:1,2,3").count(), 0);
        assert_eq!(f.pending(), 7);
    }

    #[test]
    fn message_split_across_feeds() {
        let mut f = framer();
        assert_eq!(f.feed(b"A:1,2").count(), 0);
        let messages: Vec<String> = f.feed(b",3;G:4,5,6_").collect();
        assert_eq!(messages, vec!["A:1,2,3;G:4,5,6"]);
        assert_eq!(f.pending(), 0);
    }

    #[test]
    fn multiple_messages_in_one_feed() {
        let mut f = framer();
        let messages: Vec<String> = f.feed(b"one_two_thr").collect();
        assert_eq!(messages, vec!["one", "two"]);
        assert_eq!(f.pending(), 3);

        let messages: Vec<String> = f.feed(b"ee_").collect();
        assert_eq!(messages, vec!["three"]);
    }

    #[test]
    fn consecutive_delimiters_yield_empty_messages() {
        let mut f = framer();
        let messages: Vec<String> = f.feed(b"__x_").collect();
        assert_eq!(messages, vec!["", "", "x"]);
    }

    #[test]
    fn unconsumed_messages_stay_buffered() {
        let mut f = framer();
        {
            let mut messages = f.feed(b"one_two_");
            assert_eq!(messages.next().as_deref(), Some("one"));
            // drop the iterator with "two_" still buffered
        }
        let messages: Vec<String> = f.feed(b"").collect();
        assert_eq!(messages, vec!["two"]);
    }

    #[test]
    fn conservation_over_incremental_feeds() {
        // concatenation of yields plus leftover equals concatenation of
        // feeds minus delimiters
        let chunks: &[&[u8]] = &[b"A:1,", b"2,3;G:4,5,6_V:3.7", b";T:20,21_par", b"tial"];
        let mut f = framer();
        let mut yielded = String::new();
        for chunk in chunks {
            for message in f.feed(chunk) {
                yielded.push_str(&message);
            }
        }

        let fed: String = chunks
            .iter()
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect();
        let expected: String = fed.chars().filter(|&c| c != '_').collect();
        let leftover_len = f.pending();
        assert_eq!(yielded.len() + leftover_len, expected.len());
        assert!(expected.starts_with(&yielded));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn no_bytes_created_or_destroyed(
                chunks in proptest::collection::vec("[a-zA-Z0-9_,.;:]{0,20}", 0..10)
            ) {
                let mut f = framer();
                let mut yielded = Vec::new();
                for chunk in &chunks {
                    yielded.extend(f.feed(chunk.as_bytes()));
                }

                let fed: String = chunks.concat();
                let without_delimiters: String =
                    fed.chars().filter(|&c| c != '_').collect();
                let mut reassembled: String = yielded.concat();
                // leftover partial message
                for message in f.feed(b"_") {
                    reassembled.push_str(&message);
                }
                prop_assert_eq!(reassembled, without_delimiters);
            }
        }
    }
}
