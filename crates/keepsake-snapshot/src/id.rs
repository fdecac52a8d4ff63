//! Per-domain identifier generation
//!
//! Ids have the form `{millis:013}-{seq:04}`. The millisecond part comes
//! from the wall clock but never moves backwards for a given domain; the
//! sequence part disambiguates creations that land on the same
//! millisecond, and past [`MAX_SEQ`] the id moves on to the next
//! millisecond. Within one generator, ids issued for a domain are unique
//! and sort lexicographically in creation order.

use std::collections::HashMap;

/// Largest sequence number that fits the four-digit suffix
const MAX_SEQ: u32 = 9999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Backup,
    Account,
}

#[derive(Debug, Clone, Copy)]
struct Issued {
    millis: i64,
    seq: u32,
}

impl Issued {
    fn successor(self) -> Self {
        if self.seq >= MAX_SEQ {
            Issued {
                millis: self.millis + 1,
                seq: 0,
            }
        } else {
            Issued {
                millis: self.millis,
                seq: self.seq + 1,
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct IdGenerator {
    last: HashMap<(RecordKind, String), Issued>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next id for `(kind, domain)` at wall-clock `now_millis`.
    ///
    /// `taken` reports ids already present in the domain's records, such as
    /// ones loaded from an earlier process; those are skipped.
    pub fn next<F>(&mut self, kind: RecordKind, domain: &str, now_millis: i64, taken: F) -> String
    where
        F: Fn(&str) -> bool,
    {
        let key = (kind, domain.to_string());

        let mut issued = match self.last.get(&key) {
            Some(prev) if now_millis <= prev.millis => prev.successor(),
            _ => Issued {
                millis: now_millis,
                seq: 0,
            },
        };

        let mut id = format_id(issued);
        while taken(&id) {
            issued = issued.successor();
            id = format_id(issued);
        }

        self.last.insert(key, issued);
        id
    }
}

fn format_id(issued: Issued) -> String {
    format!("{:013}-{:04}", issued.millis, issued.seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_millisecond_is_disambiguated() {
        let mut ids = IdGenerator::new();

        let first = ids.next(RecordKind::Backup, "example.com", 1_700_000_000_000, |_| false);
        let second = ids.next(RecordKind::Backup, "example.com", 1_700_000_000_000, |_| false);

        assert_eq!(first, "1700000000000-0000");
        assert_eq!(second, "1700000000000-0001");
    }

    #[test]
    fn test_clock_going_backwards_stays_monotonic() {
        let mut ids = IdGenerator::new();

        let first = ids.next(RecordKind::Backup, "example.com", 2_000, |_| false);
        let second = ids.next(RecordKind::Backup, "example.com", 1_000, |_| false);

        assert!(second > first);
        assert_eq!(second, "0000000002000-0001");
    }

    #[test]
    fn test_new_millisecond_resets_sequence() {
        let mut ids = IdGenerator::new();

        ids.next(RecordKind::Account, "example.com", 1_000, |_| false);
        ids.next(RecordKind::Account, "example.com", 1_000, |_| false);
        let later = ids.next(RecordKind::Account, "example.com", 1_001, |_| false);

        assert_eq!(later, "0000000001001-0000");
    }

    #[test]
    fn test_domains_and_kinds_are_independent() {
        let mut ids = IdGenerator::new();

        let a = ids.next(RecordKind::Backup, "a.com", 5, |_| false);
        let b = ids.next(RecordKind::Backup, "b.com", 5, |_| false);
        let c = ids.next(RecordKind::Account, "a.com", 5, |_| false);

        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_skips_ids_already_taken() {
        let mut ids = IdGenerator::new();
        let existing = ["0000000000005-0000", "0000000000005-0001"];

        let id = ids.next(RecordKind::Backup, "a.com", 5, |candidate| {
            existing.contains(&candidate)
        });

        assert_eq!(id, "0000000000005-0002");
    }

    #[test]
    fn test_sequence_overflow_keeps_order() {
        let mut ids = IdGenerator::new();

        let issued: Vec<String> = (0..=MAX_SEQ + 1)
            .map(|_| ids.next(RecordKind::Backup, "a.com", 5, |_| false))
            .collect();

        assert_eq!(issued[MAX_SEQ as usize], "0000000000005-9999");
        assert_eq!(issued[MAX_SEQ as usize + 1], "0000000000006-0000");

        let mut sorted = issued.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted, issued);

        // The wall clock catching up to the borrowed millisecond continues from it
        let next = ids.next(RecordKind::Backup, "a.com", 6, |_| false);
        assert_eq!(next, "0000000000006-0001");
    }
}
