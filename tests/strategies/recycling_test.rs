/*!
 * Ring Buffer and Object Pool Tests
 * Write-once rings and size-keyed recycling
 */

use rawmem_kernel::strategies::{
    self, ArenaAllocator, BuddyAllocator, ObjectPoolAllocator, RingBufferAllocator,
};
use rawmem_kernel::{AlignmentMode, AllocationStrategy, ErrorKind, MemoryTracker, StrategyKind};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[test]
fn test_ring_is_write_once_until_reset() {
    let mut ring =
        RingBufferAllocator::new(Arc::new(MemoryTracker::new()), 256, AlignmentMode::None).unwrap();
    let chunks: Vec<_> = (0..4).map(|_| ring.allocate(64).unwrap()).collect();
    assert!(ring.is_full());

    for chunk in &chunks {
        ring.free(chunk).unwrap();
    }
    assert_eq!(ring.allocate(1).unwrap_err().kind(), ErrorKind::OutOfMemory);

    ring.reset().unwrap();
    assert_eq!(ring.allocate(64).unwrap().offset, 0);
}

#[test]
fn test_ring_chunks_share_base_block() {
    let mut ring =
        RingBufferAllocator::new(Arc::new(MemoryTracker::new()), 1024, AlignmentMode::Page).unwrap();
    let a = ring.allocate(100).unwrap();
    let b = ring.allocate(100).unwrap();
    assert_eq!(a.block.id, b.block.id);
    assert_eq!(b.address() - a.address(), 100);
    assert_eq!(a.address() % 4096, 0);
}

#[test]
fn test_object_pool_reuse_and_capacity() {
    let tracker = Arc::new(MemoryTracker::new());
    let mut pool = ObjectPoolAllocator::new(Arc::clone(&tracker), 1024, AlignmentMode::Word).unwrap();

    let objects: Vec<_> = (0..4).map(|_| pool.allocate(256).unwrap()).collect();
    assert_eq!(pool.allocate(256).unwrap_err().kind(), ErrorKind::OutOfMemory);

    pool.free(&objects[0]).unwrap();
    let reused = pool.allocate(256).unwrap();
    assert_eq!(reused.block.id, objects[0].block.id);
    assert_eq!(tracker.active_blocks(), 4);
}

#[test]
fn test_object_pool_rejects_freed_blocks() {
    let tracker = Arc::new(MemoryTracker::new());
    let mut pool = ObjectPoolAllocator::new(Arc::clone(&tracker), 1024, AlignmentMode::Word).unwrap();
    let object = pool.allocate(64).unwrap();
    tracker.free(&object.block).unwrap();
    assert_eq!(pool.free(&object).unwrap_err().kind(), ErrorKind::IllegalState);
}

#[test]
fn test_object_pool_rejects_other_allocators_memory() {
    let tracker = Arc::new(MemoryTracker::new());
    let mut buddy = BuddyAllocator::new(Arc::clone(&tracker), 1024, AlignmentMode::Word).unwrap();
    let mut pool = ObjectPoolAllocator::new(Arc::clone(&tracker), 1024, AlignmentMode::Word).unwrap();

    let carved = buddy.allocate(64).unwrap();
    let err = pool.free(&carved).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalState);
    assert_eq!(pool.pooled(64), 0);

    let fresh = pool.allocate(64).unwrap();
    assert_ne!(fresh.block.id, carved.block.id);

    pool.reset().unwrap();
    assert!(tracker.is_live(&carved.block));
    buddy.free(&carved).unwrap();
    pool.free(&fresh).unwrap();
}

#[test]
fn test_bulk_strategies_reject_other_allocators_memory() {
    let tracker = Arc::new(MemoryTracker::new());
    let mut ring = RingBufferAllocator::new(Arc::clone(&tracker), 1024, AlignmentMode::Word).unwrap();
    let mut arena = ArenaAllocator::new(Arc::clone(&tracker), 1024, AlignmentMode::Word).unwrap();

    let from_ring = ring.allocate(64).unwrap();
    let from_arena = arena.allocate(64).unwrap();
    assert_eq!(arena.free(&from_ring).unwrap_err().kind(), ErrorKind::IllegalState);
    assert_eq!(ring.free(&from_arena).unwrap_err().kind(), ErrorKind::IllegalState);

    ring.free(&from_ring).unwrap();
    arena.free(&from_arena).unwrap();
}

#[test]
fn test_build_by_name() {
    let tracker = Arc::new(MemoryTracker::new());
    for name in ["buddy", "slab", "arena", "ring_buffer", "object_pool", "hybrid"] {
        let kind: StrategyKind = name.parse().unwrap();
        let mut strategy =
            strategies::build(kind, Arc::clone(&tracker), 1024 * 1024, AlignmentMode::Word).unwrap();
        let memory = strategy.allocate(128).unwrap();
        assert_eq!(memory.address() % 8, 0, "{} returned a misaligned address", kind);
        strategy.free(&memory).unwrap();
        strategy.reset().unwrap();
    }
    assert_eq!(tracker.active_blocks(), 0);
}

#[test]
fn test_unknown_strategy_name() {
    let err = "first_fit".parse::<StrategyKind>().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalState);
}
