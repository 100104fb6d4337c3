//! Trade ID generation
//!
//! IDs follow the ledger's `T{unix_millis}{seq}` shape. The suffix is a
//! process-wide monotonic counter (randomly seeded) rather than a
//! 3-digit random draw, so concurrent callers inside one process can
//! never mint the same id within a millisecond. Cross-process
//! collisions are still caught by the ledger's unique index, which the
//! caller handles by regenerating and retrying the append once.

use chrono::Utc;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

const SEQ_SPACE: u64 = 1_000_000;

/// Generator for unique trade ids.
pub struct TradeIdGenerator {
    seq: AtomicU64,
}

impl TradeIdGenerator {
    pub fn new() -> Self {
        // Random seed so restarts don't restart the suffix at zero.
        let seed = rand::thread_rng().gen_range(0..SEQ_SPACE);
        Self {
            seq: AtomicU64::new(seed),
        }
    }

    /// Mint the next id, e.g. `T1697234567123000042`.
    pub fn next_id(&self) -> String {
        let millis = Utc::now().timestamp_millis();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) % SEQ_SPACE;
        format!("T{}{:06}", millis, seq)
    }
}

impl Default for TradeIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_id_shape() {
        let generator = TradeIdGenerator::new();
        let id = generator.next_id();
        assert!(id.starts_with('T'));
        // 13-digit millisecond timestamp plus 6-digit sequence.
        assert_eq!(id.len(), 1 + 13 + 6);
        assert!(id[1..].bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn test_sequential_ids_are_unique() {
        let generator = TradeIdGenerator::new();
        let ids: HashSet<String> = (0..10_000).map(|_| generator.next_id()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_concurrent_ids_are_unique() {
        let generator = Arc::new(TradeIdGenerator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let generator = generator.clone();
            handles.push(std::thread::spawn(move || {
                (0..1000).map(|_| generator.next_id()).collect::<Vec<_>>()
            }));
        }

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id), "duplicate trade id under concurrency");
            }
        }
        assert_eq!(all.len(), 8000);
    }
}
