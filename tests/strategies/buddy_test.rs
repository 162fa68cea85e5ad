/*!
 * Buddy Allocator Tests
 * Splitting, coalescing and exhaustion
 */

use proptest::prelude::*;
use rawmem_kernel::strategies::BuddyAllocator;
use rawmem_kernel::{AlignmentMode, AllocationStrategy, ErrorKind, MemoryTracker};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const MIB: usize = 1024 * 1024;

fn buddy(size: usize) -> BuddyAllocator {
    BuddyAllocator::new(Arc::new(MemoryTracker::new()), size, AlignmentMode::Word).unwrap()
}

#[test]
fn test_freed_buddies_merge_into_next_order() {
    let mut allocator = buddy(MIB);
    let a = allocator.allocate(100).unwrap();
    let b = allocator.allocate(100).unwrap();
    assert_eq!((a.granted_size, b.granted_size), (128, 128));
    assert_eq!(a.offset ^ 128, b.offset);

    // Hold the order-8 neighbour so the merged pair stops at order 8
    let neighbour = allocator.allocate(256).unwrap();
    assert_eq!(neighbour.offset, 256);

    allocator.free(&a).unwrap();
    allocator.free(&b).unwrap();
    assert_eq!(allocator.free_blocks_at(7), 0);
    assert_eq!(allocator.free_blocks_at(8), 1);
    assert!(allocator.is_free_at(8, 0));
}

#[test]
fn test_free_order_does_not_matter() {
    let mut allocator = buddy(4096);
    let blocks: Vec<_> = (0..8).map(|_| allocator.allocate(512).unwrap()).collect();
    assert!(allocator.allocate(1).is_err());

    for memory in blocks.iter().rev().step_by(2).chain(blocks.iter().step_by(2)) {
        allocator.free(memory).unwrap();
    }
    assert_eq!(allocator.free_blocks_at(allocator.max_order()), 1);
    assert_eq!(allocator.stats().allocated_size, 0);
}

#[test]
fn test_exhaustion_then_recovery() {
    let mut allocator = buddy(1024);
    let whole = allocator.allocate(1024).unwrap();
    let err = allocator.allocate(1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfMemory);

    allocator.free(&whole).unwrap();
    assert!(allocator.allocate(1).is_ok());
    assert_eq!(allocator.stats().failed_allocations, 1);
}

#[test]
fn test_foreign_memory_rejected() {
    let tracker = Arc::new(MemoryTracker::new());
    let mut first = BuddyAllocator::new(Arc::clone(&tracker), 1024, AlignmentMode::None).unwrap();
    let mut second = BuddyAllocator::new(tracker, 1024, AlignmentMode::None).unwrap();

    let memory = first.allocate(64).unwrap();
    assert_eq!(second.free(&memory).unwrap_err().kind(), ErrorKind::IllegalState);
}

#[test]
fn test_base_block_released_on_drop() {
    let tracker = Arc::new(MemoryTracker::new());
    let allocator = BuddyAllocator::new(Arc::clone(&tracker), 1000, AlignmentMode::Page).unwrap();
    assert_eq!(tracker.active_blocks(), 1);
    assert_eq!(tracker.allocated_blocks()[0].requested_size, 1024);
    drop(allocator);
    assert_eq!(tracker.active_blocks(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_freeing_everything_restores_top_block(sizes in prop::collection::vec(1usize..2048, 1..40)) {
        let mut allocator = buddy(64 * 1024);
        let live: Vec<_> = sizes
            .iter()
            .filter_map(|size| allocator.allocate(*size).ok())
            .collect();

        for memory in &live {
            prop_assert!(memory.granted_size.is_power_of_two());
            prop_assert!(memory.granted_size >= memory.requested_size);
            prop_assert_eq!(memory.offset % memory.granted_size, 0);
        }
        for memory in &live {
            allocator.free(memory).unwrap();
        }

        prop_assert_eq!(allocator.free_blocks_at(allocator.max_order()), 1);
        for order in 0..allocator.max_order() {
            prop_assert_eq!(allocator.free_blocks_at(order), 0);
        }
    }
}
