/*!
 * Leak Detection and Bulk Release
 * Aging scans over the registry and best-effort cleanup
 */

use super::super::types::MemoryBlock;
use super::MemoryTracker;
use crate::core::types::BlockId;
use log::{info, warn};
use std::time::Duration;

impl MemoryTracker {
    /// Live blocks older than `max_age`
    ///
    /// Non-destructive: the blocks stay allocated.
    pub fn find_potential_leaks(&self, max_age: Duration) -> Vec<MemoryBlock> {
        let now = self.now();
        let max_age_us = max_age.as_micros() as u64;

        let mut leaks: Vec<MemoryBlock> = self
            .blocks
            .iter()
            .filter(|entry| {
                let block = entry.value();
                !block.freed && now.saturating_sub(block.created_at) > max_age_us
            })
            .map(|entry| entry.value().clone())
            .collect();
        leaks.sort_by_key(|b| b.id);

        if !leaks.is_empty() {
            warn!(
                "Leak scan found {} blocks older than {:?} ({} bytes)",
                leaks.len(),
                max_age,
                leaks.iter().map(|b| b.padded_size).sum::<usize>()
            );
        }
        leaks
    }

    /// Free every live block
    ///
    /// Each block is attempted independently; failures are logged and counted
    /// but never abort the sweep. Returns the number of blocks freed.
    pub fn free_all_memory(&self) -> usize {
        let ids: Vec<BlockId> = self.blocks.iter().map(|entry| *entry.key()).collect();
        let mut freed = 0;
        let mut failed = 0;

        for id in ids {
            let Some(block) = self.lookup(id) else {
                // Freed concurrently by another caller
                failed += 1;
                continue;
            };
            match self.free(&block) {
                Ok(_) => freed += 1,
                Err(e) => {
                    failed += 1;
                    warn!("Sweep could not free block {}: {}", id, e);
                }
            }
        }

        info!(
            "Freed {} blocks during sweep ({} failures), {} bytes still held",
            freed,
            failed,
            self.counters.current_allocated()
        );
        freed
    }
}
