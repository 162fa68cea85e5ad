/*!
 * Memory Tracker Tests
 * Allocation, free, reallocation, leak scans and exhaustion
 */

use rawmem_kernel::memory::MemoryPressure;
use rawmem_kernel::{AlignmentMode, ErrorKind, MemoryError, MemoryTracker};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_word_aligned_allocation_and_free() {
    let tracker = MemoryTracker::new();
    let before = tracker.current_allocated();

    let block = tracker.allocate(1024, AlignmentMode::Word).unwrap();
    assert_eq!(block.address % 8, 0);
    assert!(block.address >= block.raw_address);
    assert_eq!(block.padded_size, 1024 + 7);
    assert_eq!(tracker.current_allocated(), before + block.padded_size);

    tracker.free(&block).unwrap();
    assert_eq!(tracker.current_allocated(), before);
    assert_eq!(tracker.active_blocks(), 0);
}

#[test]
fn test_every_alignment_mode() {
    let tracker = MemoryTracker::new();
    for mode in AlignmentMode::ALL {
        let block = tracker.allocate(100, mode).unwrap();
        assert_eq!(block.address % mode.bytes(), 0, "{} misaligned", mode);
        assert!(block.address - block.raw_address < mode.bytes());
        tracker.free(&block).unwrap();
    }
}

#[test]
fn test_zero_size_is_invalid_argument() {
    let tracker = MemoryTracker::new();
    let err = tracker.allocate(0, AlignmentMode::None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_double_free() {
    let tracker = MemoryTracker::new();
    let block = tracker.allocate(64, AlignmentMode::None).unwrap();
    let freed = tracker.free(&block).unwrap();
    assert!(freed.freed);
    assert!(freed.freed_at.is_some());

    let err = tracker.free(&block).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalState);
}

#[test]
fn test_stale_copy_cannot_be_freed() {
    let tracker = MemoryTracker::new();
    let block = tracker.allocate(64, AlignmentMode::None).unwrap();
    let copy = block.clone();
    tracker.free(&block).unwrap();

    // A later allocation may land on the same address but never the same id
    let next = tracker.allocate(64, AlignmentMode::None).unwrap();
    assert_ne!(next.id, copy.id);
    assert!(tracker.free(&copy).is_err());
    assert!(tracker.is_live(&next));
}

#[test]
fn test_reallocate_keeps_data_and_alignment() {
    let tracker = MemoryTracker::new();
    let block = tracker.allocate(16, AlignmentMode::CacheLine).unwrap();
    tracker.write_bytes(&block, 0, b"0123456789abcdef").unwrap();

    let grown = tracker.reallocate(&block, 4096).unwrap();
    assert_ne!(grown.id, block.id);
    assert_eq!(grown.requested_size, 4096);
    assert_eq!(grown.address % 64, 0);
    assert_eq!(tracker.read_bytes(&grown, 0, 16).unwrap(), b"0123456789abcdef".to_vec());

    assert!(!tracker.is_live(&block));
    assert_eq!(tracker.active_blocks(), 1);
    assert_eq!(tracker.current_allocated(), grown.padded_size);
}

#[test]
fn test_reallocate_freed_block() {
    let tracker = MemoryTracker::new();
    let block = tracker.allocate(16, AlignmentMode::None).unwrap();
    tracker.free(&block).unwrap();
    let err = tracker.reallocate(&block, 32).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalState);
}

#[test]
fn test_stats() {
    let tracker = MemoryTracker::new();
    let a = tracker.allocate(100, AlignmentMode::None).unwrap();
    let b = tracker.allocate(300, AlignmentMode::None).unwrap();
    tracker.free(&a).unwrap();

    let stats = tracker.stats();
    assert_eq!(stats.total_allocated, 400);
    assert_eq!(stats.total_freed, 100);
    assert_eq!(stats.current_allocated, 300);
    assert_eq!(stats.peak_allocated, 400);
    assert_eq!(stats.active_blocks, 1);
    assert_eq!(stats.average_block_size, 300.0);

    let blocks = tracker.allocated_blocks();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].id, b.id);
}

#[test]
fn test_budget_exhaustion() {
    let tracker = MemoryTracker::with_budget(1024);
    let block = tracker.allocate(1000, AlignmentMode::None).unwrap();

    match tracker.allocate(100, AlignmentMode::None) {
        Err(MemoryError::OutOfMemory { requested, available }) => {
            assert_eq!(requested, 100);
            assert_eq!(available, 24);
        }
        other => panic!("expected OutOfMemory, got {:?}", other),
    }

    tracker.free(&block).unwrap();
    assert!(tracker.allocate(1024, AlignmentMode::None).is_ok());
}

#[test]
fn test_pressure_follows_budget() {
    let tracker = MemoryTracker::with_budget(1000);
    assert_eq!(tracker.stats().pressure, MemoryPressure::Low);
    let _block = tracker.allocate(900, AlignmentMode::None).unwrap();
    assert_eq!(tracker.stats().pressure, MemoryPressure::High);
}

#[test]
fn test_leak_scan_and_sweep() {
    let tracker = MemoryTracker::new();
    for size in [10, 20, 30] {
        tracker.allocate(size, AlignmentMode::None).unwrap();
    }

    assert!(tracker.find_potential_leaks(Duration::from_secs(3600)).is_empty());
    thread::sleep(Duration::from_millis(5));
    let leaks = tracker.find_potential_leaks(Duration::from_millis(1));
    assert_eq!(leaks.len(), 3);
    assert_eq!(tracker.active_blocks(), 3);

    assert_eq!(tracker.free_all_memory(), 3);
    assert_eq!(tracker.active_blocks(), 0);
    assert_eq!(tracker.current_allocated(), 0);
}

#[test]
fn test_concurrent_allocate_free() {
    let tracker = Arc::new(MemoryTracker::new());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                for i in 0..200 {
                    let block = tracker.allocate(16 + (t * 200 + i) % 512, AlignmentMode::Word).unwrap();
                    tracker.free(&block).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = tracker.stats();
    assert_eq!(stats.active_blocks, 0);
    assert_eq!(stats.current_allocated, 0);
    assert_eq!(stats.total_allocated, stats.total_freed);
}
