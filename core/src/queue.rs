use std::collections::VecDeque;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::models::{Entry, Progress};

/// What the review dialog currently has open.
///
/// A batch is consumed strictly from the head; `original_len` never shrinks,
/// so `original_len >= queue.len()` holds for the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EditSession {
    #[default]
    Idle,
    BatchOpen {
        queue: VecDeque<Entry>,
        original_len: usize,
    },
    SingleEdit {
        entry: Entry,
    },
}

impl EditSession {
    /// Replace the session with a new batch. Empty batches leave it untouched.
    pub fn seed(&mut self, items: Vec<Entry>) -> bool {
        if items.is_empty() {
            return false;
        }
        *self = EditSession::BatchOpen {
            original_len: items.len(),
            queue: items.into(),
        };
        true
    }

    #[must_use]
    pub fn current(&self) -> Option<&Entry> {
        match self {
            EditSession::Idle => None,
            EditSession::BatchOpen { queue, .. } => queue.front(),
            EditSession::SingleEdit { entry } => Some(entry),
        }
    }

    pub fn current_mut(&mut self) -> Option<&mut Entry> {
        match self {
            EditSession::Idle => None,
            EditSession::BatchOpen { queue, .. } => queue.front_mut(),
            EditSession::SingleEdit { entry } => Some(entry),
        }
    }

    /// Drop the batch head and open the next one, going idle when the batch is used up.
    /// Outside a batch this does nothing.
    pub fn advance(&mut self) -> Option<Entry> {
        let EditSession::BatchOpen { queue, .. } = self else {
            return None;
        };
        let head = queue.pop_front();
        if queue.is_empty() {
            *self = EditSession::Idle;
        }
        head
    }

    #[must_use]
    pub fn progress(&self) -> Option<Progress> {
        match self {
            EditSession::BatchOpen {
                queue,
                original_len,
            } if !queue.is_empty() => Some(Progress {
                position: original_len - queue.len() + 1,
                total: *original_len,
            }),
            _ => None,
        }
    }

    /// Open an already persisted entry for correction.
    pub fn open_single(&mut self, entry: Entry) -> Result<()> {
        if self.is_batch() {
            bail!("Finish reviewing the current batch before editing another entry");
        }
        *self = EditSession::SingleEdit { entry };
        Ok(())
    }

    pub fn close(&mut self) {
        *self = EditSession::Idle;
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, EditSession::Idle)
    }

    #[must_use]
    pub fn is_batch(&self) -> bool {
        matches!(self, EditSession::BatchOpen { .. })
    }

    /// Whether `id` is still waiting anywhere in the session.
    #[must_use]
    pub fn holds(&self, id: &str) -> bool {
        match self {
            EditSession::Idle => false,
            EditSession::BatchOpen { queue, .. } => queue.iter().any(|e| e.id == id),
            EditSession::SingleEdit { entry } => entry.id == id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryKind;

    fn candidate(id: &str) -> Entry {
        Entry {
            id: id.to_string(),
            timestamp: 1_700_000_000_000,
            description: format!("food {id}"),
            kind: EntryKind::FoodEntry,
            meal_slot: None,
            calories: Some(100.0),
            protein: None,
            carbs: None,
            fat: None,
            amount: None,
            unit: None,
        }
    }

    #[test]
    fn test_seed_empty_is_ignored() {
        let mut session = EditSession::default();
        assert!(!session.seed(vec![]));
        assert!(session.is_idle());

        session.open_single(candidate("x")).unwrap();
        assert!(!session.seed(vec![]));
        assert_eq!(session.current().unwrap().id, "x");
    }

    #[test]
    fn test_batch_progress_until_idle() {
        let mut session = EditSession::default();
        session.seed(vec![candidate("1"), candidate("2"), candidate("3")]);

        let mut positions = Vec::new();
        while let Some(progress) = session.progress() {
            assert_eq!(progress.total, 3);
            assert_eq!(session.current().unwrap().id, progress.position.to_string());
            positions.push(progress.position);
            session.advance();
        }

        assert_eq!(positions, vec![1, 2, 3]);
        assert!(session.is_idle());
        assert!(session.current().is_none());
    }

    #[test]
    fn test_advance_outside_batch_is_noop() {
        let mut session = EditSession::default();
        assert!(session.advance().is_none());

        session.open_single(candidate("x")).unwrap();
        assert!(session.advance().is_none());
        assert_eq!(session.current().unwrap().id, "x");
        assert!(session.progress().is_none());
    }

    #[test]
    fn test_open_single_rejected_during_batch() {
        let mut session = EditSession::default();
        session.seed(vec![candidate("1")]);
        assert!(session.open_single(candidate("x")).is_err());
        assert_eq!(session.current().unwrap().id, "1");
    }

    #[test]
    fn test_session_survives_serialization() {
        let mut session = EditSession::default();
        session.seed(vec![candidate("1"), candidate("2")]);
        session.advance();

        let json = serde_json::to_string(&session).unwrap();
        let restored: EditSession = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, session);
        assert_eq!(
            restored.progress(),
            Some(Progress {
                position: 2,
                total: 2
            })
        );
    }
}
