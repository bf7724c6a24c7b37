use crate::richtext::content_document::ContentDocument;

pub const MAX_HISTORY_SIZE: usize = 100;

/// Undo/redo stack of document snapshots
#[derive(Debug)]
pub struct EditHistory {
    undo: Vec<ContentDocument>,
    redo: Vec<ContentDocument>,
    limit: usize,
}

impl Default for EditHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl EditHistory {
    pub fn new() -> Self {
        Self::with_limit(MAX_HISTORY_SIZE)
    }

    pub fn with_limit(limit: usize) -> Self {
        EditHistory {
            undo: Vec::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Record the state before an edit.
    /// This clears any redo history.
    pub fn push(&mut self, snapshot: ContentDocument) {
        self.redo.clear();
        self.undo.push(snapshot);

        // Limit history size
        if self.undo.len() > self.limit {
            self.undo.remove(0);
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Step back: returns the state to restore, keeping `current` for redo
    pub fn undo(&mut self, current: ContentDocument) -> Option<ContentDocument> {
        let previous = self.undo.pop()?;
        self.redo.push(current);
        Some(previous)
    }

    /// Step forward again after an undo
    pub fn redo(&mut self, current: ContentDocument) -> Option<ContentDocument> {
        let next = self.redo.pop()?;
        self.undo.push(current);
        Some(next)
    }

    pub fn len(&self) -> usize {
        self.undo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> ContentDocument {
        ContentDocument::with_paragraph(text)
    }

    #[test]
    fn test_push_and_undo_redo() {
        let mut history = EditHistory::new();

        history.push(doc("one"));
        history.push(doc("two"));
        assert!(history.can_undo());
        assert!(!history.can_redo());

        let restored = history.undo(doc("three")).unwrap();
        assert_eq!(restored.to_plain_text(), "two");
        assert!(history.can_redo());

        let again = history.redo(restored).unwrap();
        assert_eq!(again.to_plain_text(), "three");
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_push_clears_redo() {
        let mut history = EditHistory::new();

        history.push(doc("one"));
        let restored = history.undo(doc("two")).unwrap();
        assert!(history.can_redo());

        history.push(restored);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_max_size() {
        let mut history = EditHistory::new();

        // Add more than MAX_HISTORY_SIZE entries
        for i in 0..150 {
            history.push(doc(&format!("state{}", i)));
        }

        // Should only keep the last 100
        assert_eq!(history.len(), MAX_HISTORY_SIZE);
        let latest = history.undo(doc("now")).unwrap();
        assert_eq!(latest.to_plain_text(), "state149");
    }

    #[test]
    fn test_undo_on_empty_history() {
        let mut history = EditHistory::with_limit(3);
        assert!(history.undo(doc("x")).is_none());
        assert!(!history.can_redo());
    }
}
