use log::warn;

use crate::error::FramingError;
use crate::pipeline::types::{SerialMessage, MESSAGE_END};

/**
 * Default bound (bytes) for text that is waiting for a message terminator.
 */
pub const DEFAULT_MAX_PENDING_LEN: usize = 4096;

/// Turns arbitrarily split serial fragments back into complete messages.
///
/// Text after the last terminator is kept until a later fragment completes it, or until
/// [`FragmentAssembler::reset`] is called on disconnect.
#[derive(Debug, Clone)]
pub struct FragmentAssembler {
    pending: String,
    max_pending_len: usize,
}

impl FragmentAssembler {
    pub fn new(max_pending_len: usize) -> Self {
        FragmentAssembler {
            pending: String::new(),
            max_pending_len,
        }
    }

    /// Appends `fragment` and returns the messages it completed, in order.
    ///
    /// The messages are cut from the buffer lazily. Messages that are not pulled from the
    /// iterator stay buffered and are returned by the next call.
    pub fn feed(&mut self, fragment: &str) -> Messages<'_> {
        self.pending.push_str(fragment);

        Messages {
            assembler: self,
            done: false,
        }
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

impl Default for FragmentAssembler {
    fn default() -> Self {
        FragmentAssembler::new(DEFAULT_MAX_PENDING_LEN)
    }
}

pub struct Messages<'a> {
    assembler: &'a mut FragmentAssembler,
    done: bool,
}

impl Iterator for Messages<'_> {
    type Item = Result<SerialMessage, FramingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let pending = &mut self.assembler.pending;

        if let Some(end) = pending.find(MESSAGE_END) {
            let raw: String = pending.drain(..=end).collect();
            return Some(Ok(SerialMessage::new(raw)));
        }

        self.done = true;

        // only the unterminated residue counts against the bound
        let limit = self.assembler.max_pending_len;
        if pending.len() > limit {
            let dropped = pending.len();
            pending.clear();
            warn!("No message terminator within {} bytes, dropping {} pending bytes", limit, dropped);
            return Some(Err(FramingError::Overflow { limit, dropped }));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(assembler: &mut FragmentAssembler, fragment: &str) -> Vec<String> {
        assembler
            .feed(fragment)
            .map(|result| result.expect("unexpected framing error").into_raw())
            .collect()
    }

    #[test]
    fn test_single_message_in_one_fragment() {
        let mut assembler = FragmentAssembler::default();
        assert_eq!(collect(&mut assembler, "<fl=1.0,fr=2.0>"), vec!["<fl=1.0,fr=2.0>"]);
        assert_eq!(assembler.pending(), "");
    }

    #[test]
    fn test_residue_is_kept_for_next_fragment() {
        let mut assembler = FragmentAssembler::default();
        assert_eq!(collect(&mut assembler, "<fl=1.0><fr"), vec!["<fl=1.0>"]);
        assert_eq!(assembler.pending(), "<fr");
        assert_eq!(collect(&mut assembler, "=2.0>\r\n"), vec!["<fr=2.0>"]);
        assert_eq!(assembler.pending(), "\r\n");
    }

    #[test]
    fn test_several_messages_packed_in_one_fragment() {
        let mut assembler = FragmentAssembler::default();
        assert_eq!(
            collect(&mut assembler, "<fl=1><fr=2><fl=3>"),
            vec!["<fl=1>", "<fr=2>", "<fl=3>"],
        );
    }

    #[test]
    fn test_split_anywhere_yields_same_message() {
        let stream = "<fl=3.0,fr=0.0>";

        for first in 0..=stream.len() {
            for second in first..=stream.len() {
                let mut assembler = FragmentAssembler::default();
                let mut messages = Vec::new();
                messages.extend(collect(&mut assembler, &stream[..first]));
                messages.extend(collect(&mut assembler, &stream[first..second]));
                messages.extend(collect(&mut assembler, &stream[second..]));

                assert_eq!(messages, vec![stream], "split at {} and {}", first, second);
                assert_eq!(assembler.pending(), "");
            }
        }
    }

    #[test]
    fn test_no_terminator_never_completes() {
        let mut assembler = FragmentAssembler::default();

        for _ in 0..100 {
            assert!(collect(&mut assembler, "<fl=1.0,").is_empty());
        }
        assert_eq!(assembler.pending().len(), 800);
    }

    #[test]
    fn test_overflow_drops_buffer_and_continues() {
        let mut assembler = FragmentAssembler::new(8);

        let results: Vec<Result<SerialMessage, FramingError>> = assembler.feed("<fl=1.0,fr").collect();
        assert_eq!(results, vec![Err(FramingError::Overflow { limit: 8, dropped: 10 })]);
        assert_eq!(assembler.pending(), "");

        assert_eq!(collect(&mut assembler, "<fr=2>"), vec!["<fr=2>"]);
    }

    #[test]
    fn test_completed_messages_do_not_count_against_bound() {
        let mut assembler = FragmentAssembler::new(8);
        assert_eq!(
            collect(&mut assembler, "<fl=1.0,fr=2.0><fl=3.0>"),
            vec!["<fl=1.0,fr=2.0>", "<fl=3.0>"],
        );
    }

    #[test]
    fn test_unread_messages_stay_buffered() {
        let mut assembler = FragmentAssembler::default();
        {
            let mut messages = assembler.feed("<fl=1><fr=2>");
            assert_eq!(messages.next(), Some(Ok(SerialMessage::new("<fl=1>".to_string()))));
        }
        assert_eq!(assembler.pending(), "<fr=2>");
        assert_eq!(collect(&mut assembler, ""), vec!["<fr=2>"]);
    }

    #[test]
    fn test_reset_clears_partial_message() {
        let mut assembler = FragmentAssembler::default();
        assert!(collect(&mut assembler, "<fl=1.0,fr=").is_empty());
        assembler.reset();
        assert_eq!(assembler.pending(), "");
        assert_eq!(collect(&mut assembler, "2.0>"), vec!["2.0>"]);
    }
}
