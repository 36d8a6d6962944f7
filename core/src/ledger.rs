use crate::models::Entry;

/// The nutrition history, most recent entry first.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    entries: Vec<Entry>,
}

impl Ledger {
    /// Build a ledger from persisted entries. Later duplicates of an id are dropped.
    #[must_use]
    pub fn from_entries(entries: Vec<Entry>) -> Self {
        let mut ledger = Self::default();
        for entry in entries {
            if !ledger.contains(&entry.id) {
                ledger.entries.push(entry);
            }
        }
        ledger
    }

    #[must_use]
    pub fn all(&self) -> &[Entry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Replace the entry with the same id in place, or insert at the front.
    /// Returns `true` when a new entry was inserted.
    pub fn upsert(&mut self, entry: Entry) -> bool {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.id == entry.id) {
            *existing = entry;
            false
        } else {
            self.entries.insert(0, entry);
            true
        }
    }

    /// Remove by id. Unknown ids are ignored; returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryKind;
    use std::collections::HashSet;

    fn food(id: &str, calories: f64) -> Entry {
        Entry {
            id: id.to_string(),
            timestamp: 0,
            description: format!("item {id}"),
            kind: EntryKind::FoodEntry,
            meal_slot: None,
            calories: Some(calories),
            protein: None,
            carbs: None,
            fat: None,
            amount: None,
            unit: None,
        }
    }

    #[test]
    fn test_upsert_inserts_at_front() {
        let mut ledger = Ledger::default();
        assert!(ledger.upsert(food("a", 100.0)));
        assert!(ledger.upsert(food("b", 200.0)));

        let ids: Vec<&str> = ledger.all().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_upsert_updates_in_place() {
        let mut ledger = Ledger::default();
        ledger.upsert(food("a", 100.0));
        ledger.upsert(food("b", 200.0));

        assert!(!ledger.upsert(food("a", 150.0)));
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.all()[1].calories, Some(150.0));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut ledger = Ledger::default();
        ledger.upsert(food("a", 100.0));

        assert!(ledger.remove("a"));
        assert!(!ledger.remove("a"));
        assert!(!ledger.remove("never-existed"));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_ids_stay_unique_across_mixed_operations() {
        let mut ledger = Ledger::default();
        let ops = ["a", "b", "a", "-b", "c", "b", "-a", "c", "a", "-z"];
        for (i, op) in ops.iter().enumerate() {
            if let Some(id) = op.strip_prefix('-') {
                ledger.remove(id);
            } else {
                ledger.upsert(food(op, i as f64));
            }
            let ids: HashSet<&str> = ledger.all().iter().map(|e| e.id.as_str()).collect();
            assert_eq!(ids.len(), ledger.len());
        }
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn test_from_entries_drops_duplicates() {
        let ledger = Ledger::from_entries(vec![food("a", 1.0), food("a", 2.0), food("b", 3.0)]);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get("a").unwrap().calories, Some(1.0));
    }
}
