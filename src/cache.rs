use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::Booking;

#[derive(Default)]
struct Branches {
    entries: HashMap<String, HashMap<String, Booking>>,
    // Bumped by every invalidation of the branch
    generations: HashMap<String, u64>,
    // Bumped by `clear`
    epoch: u64,
}

impl Branches {
    fn generation(&self, branch_id: &str) -> u64 {
        self.epoch + self.generations.get(branch_id).copied().unwrap_or(0)
    }
}

/// Per-branch read cache for booking lists.
///
/// Entries are filled on first read and dropped whenever a change event for
/// the branch arrives. Loaders take a [`generation`](Self::generation) before
/// reading the database and hand it back to [`replace_branch`](Self::replace_branch);
/// a snapshot read before an invalidation is discarded.
#[derive(Default)]
pub struct BookingCache {
    branches: RwLock<Branches>,
}

impl BookingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached bookings ordered by start time, or `None` when the branch has
    /// not been loaded.
    pub fn get_branch(&self, branch_id: &str) -> Option<Vec<Booking>> {
        let branches = self.branches.read().unwrap();
        let cached = branches.entries.get(branch_id)?;
        let mut bookings: Vec<Booking> = cached.values().cloned().collect();
        bookings.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        Some(bookings)
    }

    pub fn generation(&self, branch_id: &str) -> u64 {
        self.branches.read().unwrap().generation(branch_id)
    }

    /// Installs a snapshot read at `generation`. Returns false, leaving the
    /// cache untouched, if the branch was invalidated since.
    pub fn replace_branch(&self, branch_id: &str, bookings: Vec<Booking>, generation: u64) -> bool {
        let mut branches = self.branches.write().unwrap();
        if branches.generation(branch_id) != generation {
            tracing::debug!(branch_id, "discarding stale cache load");
            return false;
        }
        branches.entries.insert(
            branch_id.to_string(),
            bookings.into_iter().map(|b| (b.id.clone(), b)).collect(),
        );
        true
    }

    /// Returns true if an entry was dropped.
    pub fn invalidate(&self, branch_id: &str) -> bool {
        let mut branches = self.branches.write().unwrap();
        *branches.generations.entry(branch_id.to_string()).or_insert(0) += 1;
        branches.entries.remove(branch_id).is_some()
    }

    pub fn clear(&self) {
        let mut branches = self.branches.write().unwrap();
        branches.epoch += 1;
        branches.entries.clear();
    }

    pub fn is_loaded(&self, branch_id: &str) -> bool {
        self.branches.read().unwrap().entries.contains_key(branch_id)
    }

    pub fn count(&self, branch_id: &str) -> usize {
        self.branches
            .read()
            .unwrap()
            .entries
            .get(branch_id)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    /// How many of `ids` are present in the branch entry.
    pub fn count_present(&self, branch_id: &str, ids: &[String]) -> usize {
        let branches = self.branches.read().unwrap();
        match branches.entries.get(branch_id) {
            Some(cached) => ids.iter().filter(|id| cached.contains_key(*id)).count(),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingStatus;
    use chrono::NaiveDateTime;

    fn booking(id: &str, start: &str) -> Booking {
        let start_time = NaiveDateTime::parse_from_str(start, "%Y-%m-%d %H:%M").unwrap();
        Booking {
            id: id.to_string(),
            branch_id: "north".to_string(),
            client_id: "client-1".to_string(),
            staff_id: None,
            service_id: None,
            start_time,
            end_time: start_time + chrono::Duration::minutes(30),
            status: BookingStatus::Scheduled,
            notes: None,
            revenue_cents: None,
            payment_terms: None,
            created_at: start_time,
            updated_at: start_time,
        }
    }

    #[test]
    fn test_unloaded_branch_is_none() {
        let cache = BookingCache::new();
        assert!(cache.get_branch("north").is_none());
        assert_eq!(cache.count("north"), 0);
        assert!(!cache.invalidate("north"));
    }

    #[test]
    fn test_get_branch_orders_by_start() {
        let cache = BookingCache::new();
        let generation = cache.generation("north");
        assert!(cache.replace_branch(
            "north",
            vec![booking("late", "2024-01-10 15:00"), booking("early", "2024-01-10 08:00")],
            generation,
        ));
        let ids: Vec<_> = cache
            .get_branch("north")
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn test_count_present_and_invalidate() {
        let cache = BookingCache::new();
        cache.replace_branch("north", vec![booking("a", "2024-01-10 08:00")], 0);
        assert_eq!(
            cache.count_present("north", &["a".to_string(), "b".to_string()]),
            1
        );
        assert!(cache.invalidate("north"));
        assert!(!cache.is_loaded("north"));
    }

    #[test]
    fn test_load_racing_an_invalidation_is_discarded() {
        let cache = BookingCache::new();
        let generation = cache.generation("north");

        // A write lands between the database read and the install
        cache.invalidate("north");

        assert!(!cache.replace_branch("north", vec![booking("a", "2024-01-10 08:00")], generation));
        assert!(!cache.is_loaded("north"));

        let generation = cache.generation("north");
        assert!(cache.replace_branch("north", vec![booking("a", "2024-01-10 08:00")], generation));
        assert!(cache.is_loaded("north"));
    }

    #[test]
    fn test_clear_discards_loads_in_flight() {
        let cache = BookingCache::new();
        let north = cache.generation("north");
        let south = cache.generation("south");
        cache.clear();

        assert!(!cache.replace_branch("north", vec![], north));
        assert!(!cache.replace_branch("south", vec![], south));
        assert!(cache.replace_branch("south", vec![], cache.generation("south")));
    }
}
