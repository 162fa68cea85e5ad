/*!
 * Memory Pool Tests
 * Reuse, zeroing, overflow and concurrent access
 */

use rawmem_kernel::{AlignmentMode, ErrorKind, MemoryPool, MemoryTracker};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;

fn pool(block_size: usize, max: usize) -> (Arc<MemoryTracker>, MemoryPool) {
    let tracker = Arc::new(MemoryTracker::new());
    let pool = MemoryPool::new(Arc::clone(&tracker), block_size, AlignmentMode::CacheLine, max).unwrap();
    (tracker, pool)
}

#[test]
fn test_reuse_skips_raw_allocation() {
    let (tracker, pool) = pool(256, 4);
    let block = pool.acquire().unwrap();
    pool.release(block.clone()).unwrap();
    assert_eq!(pool.stats().available, 1);

    let calls = tracker.raw().alloc_calls();
    let again = pool.acquire().unwrap();
    assert_eq!(again.id, block.id);
    assert_eq!(tracker.raw().alloc_calls(), calls);
    assert_eq!(pool.stats().available, 0);
    assert_eq!(pool.stats().reused, 1);
}

#[test]
fn test_released_blocks_are_zeroed() {
    let (tracker, pool) = pool(64, 4);
    let block = pool.acquire().unwrap();
    assert_eq!(block.address % 64, 0);
    tracker.set_memory(&block, 0, 64, 0x5A).unwrap();
    pool.release(block).unwrap();

    let block = pool.acquire().unwrap();
    assert_eq!(tracker.read_bytes(&block, 0, 64).unwrap(), vec![0; 64]);
}

#[test]
fn test_mismatched_release_is_ignored() {
    let (tracker, pool) = pool(128, 4);
    let foreign = tracker.allocate(64, AlignmentMode::CacheLine).unwrap();
    pool.release(foreign.clone()).unwrap();

    assert_eq!(pool.stats().available, 0);
    assert!(tracker.is_live(&foreign));
}

#[test]
fn test_overflow_frees_block() {
    let (tracker, pool) = pool(32, 1);
    let a = pool.acquire().unwrap();
    let b = pool.acquire().unwrap();
    pool.release(a).unwrap();
    pool.release(b.clone()).unwrap();

    assert_eq!(pool.stats().overflowed, 1);
    assert!(!tracker.is_live(&b));
    assert_eq!(tracker.active_blocks(), 1);
}

#[test]
fn test_release_of_freed_block() {
    let (tracker, pool) = pool(32, 2);
    let block = pool.acquire().unwrap();
    tracker.free(&block).unwrap();
    let err = pool.release(block).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalState);
}

#[test]
fn test_double_release_hands_block_out_once() {
    let (tracker, pool) = pool(64, 4);
    let block = pool.acquire().unwrap();
    pool.release(block.clone()).unwrap();

    let err = pool.release(block.clone()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalState);
    assert_eq!(pool.stats().available, 1);

    let first = pool.acquire().unwrap();
    let second = pool.acquire().unwrap();
    assert_eq!(first.id, block.id);
    assert_ne!(second.id, first.id);
    assert_eq!(tracker.active_blocks(), 2);

    // back out of the pool, so it can be released again
    pool.release(first).unwrap();
    assert_eq!(pool.stats().available, 1);
}

#[test]
fn test_clear_and_drop_free_pooled_blocks() {
    let (tracker, pool) = pool(32, 8);
    let blocks: Vec<_> = (0..3).map(|_| pool.acquire().unwrap()).collect();
    for block in blocks {
        pool.release(block).unwrap();
    }
    assert_eq!(pool.clear(), 3);
    assert_eq!(tracker.active_blocks(), 0);

    let block = pool.acquire().unwrap();
    pool.release(block).unwrap();
    drop(pool);
    assert_eq!(tracker.active_blocks(), 0);
}

#[test]
fn test_concurrent_acquire_release() {
    let (tracker, pool) = pool(128, 16);
    let pool = Arc::new(pool);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for _ in 0..100 {
                    let block = pool.acquire().unwrap();
                    pool.release(block).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = pool.stats();
    assert_eq!(stats.acquired, 800);
    assert!(stats.available <= 16);
    assert_eq!(tracker.active_blocks(), stats.available);
}
