// Node ID generation - snowflake-style 64-bit IDs allocated client-side.
// Allocating before execution keeps the whole mutation plan precomputable:
// no RETURNING clause, no dialect-specific last-insert-id handling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// 64-bit ID format: [timestamp:42][shard_id:10][sequence:12]
/// This allows for 1024 shards and 4096 IDs per millisecond per shard.
#[derive(Debug)]
pub struct NodeIdGenerator {
    shard_id: u16,
    sequence: AtomicU64,
    last_timestamp: AtomicU64,
}

impl NodeIdGenerator {
    /// Create a new ID generator for the given shard.
    pub fn new(shard_id: u16) -> Self {
        assert!(shard_id < 1024, "shard ID must be less than 1024");

        Self {
            shard_id,
            sequence: AtomicU64::new(0),
            last_timestamp: AtomicU64::new(0),
        }
    }

    /// Generate the next unique ID with embedded shard information.
    pub fn next_id(&self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_millis() as u64;

        let last_ts = self.last_timestamp.load(Ordering::Relaxed);

        let sequence = if now == last_ts {
            // Same millisecond - increment sequence
            let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
            if seq >= 4096 {
                // Sequence overflow - wait for the next millisecond
                std::thread::sleep(std::time::Duration::from_millis(1));
                self.sequence.store(0, Ordering::Relaxed);
                return self.next_id();
            }
            seq
        } else {
            // New millisecond - reset sequence
            self.last_timestamp.store(now, Ordering::Relaxed);
            self.sequence.store(1, Ordering::Relaxed);
            0
        };

        let id = ((now & 0x3FFFFFFFFFF) << 22) |    // 42 bits timestamp
                 ((self.shard_id as u64) << 12) |   // 10 bits shard_id
                 (sequence & 0xFFF); // 12 bits sequence

        id as i64
    }

    /// Extract the shard ID from a node ID.
    pub fn extract_shard_id(id: i64) -> u16 {
        ((id as u64) >> 12 & 0x3FF) as u16
    }

    /// Extract the millisecond timestamp from a node ID.
    pub fn extract_timestamp(id: i64) -> u64 {
        (id as u64) >> 22
    }

    /// Extract the sequence number from a node ID.
    pub fn extract_sequence(id: i64) -> u16 {
        ((id as u64) & 0xFFF) as u16
    }

    pub fn shard_id(&self) -> u16 {
        self.shard_id
    }
}

/// Current wall-clock time in milliseconds, the unit used for stored `Time`
/// fields and the `Now` default.
pub fn current_time_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_monotonic() {
        let generator = NodeIdGenerator::new(0);
        // Enough ids to roll the per-millisecond sequence over.
        let ids: Vec<i64> = (0..10_000).map(|_| generator.next_id()).collect();

        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
        assert_eq!(sorted, ids);
    }

    #[test]
    fn test_embedded_fields_round_trip() {
        let generator = NodeIdGenerator::new(7);
        let before = current_time_millis() as u64;
        let id = generator.next_id();
        let after = current_time_millis() as u64;

        assert_eq!(NodeIdGenerator::extract_shard_id(id), 7);
        assert_eq!(generator.shard_id(), 7);
        let ts = NodeIdGenerator::extract_timestamp(id);
        assert!(ts >= before && ts <= after);
        assert_eq!(NodeIdGenerator::extract_sequence(id), 0);
    }

    #[test]
    #[should_panic(expected = "shard ID")]
    fn test_shard_range_is_enforced() {
        NodeIdGenerator::new(1024);
    }
}
