/*!
 * Slab Allocator Tests
 * Size class capacity and cell reuse
 */

use rawmem_kernel::strategies::{BuddyAllocator, SlabAllocator};
use rawmem_kernel::{AlignmentMode, AllocationStrategy, ErrorKind, MemoryTracker};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::Arc;

fn slab(total: usize) -> SlabAllocator {
    SlabAllocator::new(Arc::new(MemoryTracker::new()), total, AlignmentMode::Word).unwrap()
}

#[test]
fn test_size_class_fills_exactly() {
    let mut allocator = slab(64 * 1024);
    let max = allocator.max_objects(64);
    assert_eq!(max, allocator.slab_size() / 64);

    let offsets: HashSet<usize> = (0..max).map(|_| allocator.allocate(64).unwrap().offset).collect();
    assert_eq!(offsets.len(), max);

    let err = allocator.allocate(64).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfMemory);
}

#[test]
fn test_full_class_does_not_borrow_from_others() {
    let mut allocator = slab(64 * 1024);
    allocator.allocate(32).unwrap();
    for _ in 0..allocator.max_objects(64) {
        allocator.allocate(64).unwrap();
    }
    assert!(allocator.allocate(64).is_err());
    assert!(allocator.allocate(32).is_ok());
}

#[test]
fn test_freed_cell_is_reused() {
    let mut allocator = slab(64 * 1024);
    let cells: Vec<_> = (0..4).map(|_| allocator.allocate(100).unwrap()).collect();
    allocator.free(&cells[2]).unwrap();

    let again = allocator.allocate(100).unwrap();
    assert_eq!(again.offset, cells[2].offset);
    assert_eq!(allocator.stats().allocated_size, 400);
}

#[test]
fn test_stats_count_operations() {
    let mut allocator = slab(64 * 1024);
    let a = allocator.allocate(8).unwrap();
    allocator.free(&a).unwrap();
    let _ = allocator.allocate(0);

    let stats = allocator.stats();
    assert_eq!(stats.allocation_count, 1);
    assert_eq!(stats.deallocation_count, 1);
    assert_eq!(stats.failed_allocations, 1);
    assert_eq!(stats.free_size, 64 * 1024);
}

#[test]
fn test_foreign_memory_rejected() {
    let tracker = Arc::new(MemoryTracker::new());
    let mut allocator =
        SlabAllocator::new(Arc::clone(&tracker), 64 * 1024, AlignmentMode::Word).unwrap();
    let mut other =
        SlabAllocator::new(Arc::clone(&tracker), 64 * 1024, AlignmentMode::Word).unwrap();
    let mut buddy = BuddyAllocator::new(Arc::clone(&tracker), 1024, AlignmentMode::Word).unwrap();

    let own = allocator.allocate(64).unwrap();
    let sibling = other.allocate(64).unwrap();
    assert_eq!(sibling.offset, own.offset);
    let carved = buddy.allocate(64).unwrap();

    for foreign in [&sibling, &carved] {
        let err = allocator.free(foreign).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalState);
    }
    // a rejected free leaves the owner's cell taken
    assert_eq!(allocator.stats().allocated_size, 64);
    assert_eq!(allocator.stats().deallocation_count, 0);

    allocator.free(&own).unwrap();
    other.free(&sibling).unwrap();
    buddy.free(&carved).unwrap();
}
