//! Turn-in-progress text buffer

use crate::message::Message;

/// Owns the text of the assistant turn being streamed.
///
/// `append` only ever grows the buffer; `commit` freezes it into exactly one
/// [`Message`] per turn. Some backends emit both a message-completed and a
/// run-completed event for one turn, so a second commit is a no-op rather
/// than a double append.
#[derive(Debug, Default)]
pub struct TurnAccumulator {
    text: String,
    committed: bool,
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a delta fragment in arrival order.
    pub fn append(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }

    /// The accumulated text so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Freeze the buffer into an immutable assistant message and clear it.
    ///
    /// Returns `None` on the second and later calls within the same turn.
    pub fn commit(&mut self, id: Option<String>, run_id: Option<String>) -> Option<Message> {
        if self.committed {
            return None;
        }
        self.committed = true;
        Some(Message::assistant(std::mem::take(&mut self.text), id, run_id))
    }

    /// Clear all state for the next turn. Must run before another turn may
    /// begin, whatever the previous turn's outcome.
    pub fn reset(&mut self) {
        self.text.clear();
        self.committed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_concatenates_in_order() {
        let mut acc = TurnAccumulator::new();
        acc.append("Hel");
        acc.append("lo");
        assert_eq!(acc.text(), "Hello");
    }

    #[test]
    fn test_commit_freezes_and_clears() {
        let mut acc = TurnAccumulator::new();
        acc.append("Hello");
        let msg = acc.commit(Some("m1".into()), Some("r1".into())).unwrap();
        assert_eq!(msg.content, "Hello");
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.run_id.as_deref(), Some("r1"));
        assert!(acc.is_empty());
        assert!(acc.is_committed());
    }

    #[test]
    fn test_second_commit_is_a_no_op() {
        let mut acc = TurnAccumulator::new();
        acc.append("once");
        assert!(acc.commit(None, None).is_some());
        assert!(acc.commit(None, None).is_none());
    }

    #[test]
    fn test_reset_allows_a_fresh_turn() {
        let mut acc = TurnAccumulator::new();
        acc.append("stale");
        acc.commit(None, None);
        acc.reset();
        assert!(!acc.is_committed());
        acc.append("fresh");
        assert_eq!(acc.commit(None, None).unwrap().content, "fresh");
    }
}
