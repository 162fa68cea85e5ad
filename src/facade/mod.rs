/*!
 * Allocator Facade
 * Named strategy instances behind one reentrant lock each
 *
 * An `AllocatorRegistry` is an explicit context: it owns the tracker every
 * instance draws from, hands out shared `AdvancedAllocator` handles by name,
 * and tears them all down on `shutdown`. Distinct instances never share a
 * lock and run concurrently.
 */

use crate::core::config::KernelConfig;
use crate::core::errors::{MemoryError, MemoryResult};
use crate::core::types::Size;
use crate::memory::{AlignmentMode, MemoryTracker};
use crate::monitoring::span_allocator;
use crate::strategies::{self, AllocatedMemory, AllocationStrategy, AllocatorStats, StrategyKind};
use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{info, warn};
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::sync::Arc;

/// One named strategy instance
///
/// The strategy is fixed at construction; every operation takes the
/// instance lock for its whole duration.
pub struct AdvancedAllocator {
    name: String,
    kind: StrategyKind,
    alignment: AlignmentMode,
    strategy: ReentrantMutex<RefCell<Box<dyn AllocationStrategy>>>,
}

impl AdvancedAllocator {
    fn new(
        name: String,
        kind: StrategyKind,
        tracker: Arc<MemoryTracker>,
        total_size: Size,
        alignment: AlignmentMode,
    ) -> MemoryResult<Self> {
        let strategy = strategies::build(kind, tracker, total_size, alignment)?;
        Ok(Self::with_strategy(name, alignment, strategy))
    }

    fn with_strategy(
        name: String,
        alignment: AlignmentMode,
        strategy: Box<dyn AllocationStrategy>,
    ) -> Self {
        Self {
            name,
            kind: strategy.kind(),
            alignment,
            strategy: ReentrantMutex::new(RefCell::new(strategy)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    pub fn alignment(&self) -> AlignmentMode {
        self.alignment
    }

    pub fn allocate(&self, size: Size) -> MemoryResult<AllocatedMemory> {
        let span = span_allocator(&self.name, &self.kind.to_string(), "allocate");
        span.record_size(size);
        let _entered = span.enter();
        let guard = self.strategy.lock();
        let result = guard.borrow_mut().allocate(size);
        span.record_result(&result);
        result
    }

    pub fn free(&self, memory: &AllocatedMemory) -> MemoryResult<()> {
        let span = span_allocator(&self.name, &self.kind.to_string(), "free");
        span.record_size(memory.requested_size);
        let _entered = span.enter();
        let guard = self.strategy.lock();
        let result = guard.borrow_mut().free(memory);
        span.record_result(&result);
        result
    }

    pub fn stats(&self) -> AllocatorStats {
        let guard = self.strategy.lock();
        let stats = guard.borrow().stats();
        stats
    }

    pub fn reset(&self) -> MemoryResult<()> {
        let span = span_allocator(&self.name, &self.kind.to_string(), "reset");
        let _entered = span.enter();
        let guard = self.strategy.lock();
        let result = guard.borrow_mut().reset();
        span.record_result(&result);
        result
    }
}

impl std::fmt::Debug for AdvancedAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvancedAllocator")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("alignment", &self.alignment)
            .finish()
    }
}

/// Name -> instance table over one tracker
pub struct AllocatorRegistry {
    tracker: Arc<MemoryTracker>,
    default_alignment: AlignmentMode,
    instances: DashMap<String, Arc<AdvancedAllocator>, RandomState>,
}

impl AllocatorRegistry {
    pub fn new(tracker: Arc<MemoryTracker>) -> Self {
        Self {
            tracker,
            default_alignment: AlignmentMode::default(),
            instances: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Registry over a fresh tracker shaped by `config`
    pub fn from_config(config: &KernelConfig) -> MemoryResult<Self> {
        let mut registry = Self::new(Arc::new(MemoryTracker::from_config(config)?));
        registry.default_alignment = config.default_alignment;
        Ok(registry)
    }

    pub fn tracker(&self) -> &Arc<MemoryTracker> {
        &self.tracker
    }

    /// Instance for `name` with the registry's default alignment
    pub fn get_instance(
        &self,
        name: &str,
        kind: StrategyKind,
        total_size: Size,
    ) -> MemoryResult<Arc<AdvancedAllocator>> {
        self.get_instance_aligned(name, kind, total_size, self.default_alignment)
    }

    /// Existing instance for `name`, or a new one built from the arguments
    ///
    /// An existing instance keeps its original strategy and capacity.
    pub fn get_instance_aligned(
        &self,
        name: &str,
        kind: StrategyKind,
        total_size: Size,
        alignment: AlignmentMode,
    ) -> MemoryResult<Arc<AdvancedAllocator>> {
        if name.is_empty() {
            return Err(MemoryError::invalid_argument("allocator name must not be empty"));
        }

        match self.instances.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                let existing = entry.get();
                if existing.kind() != kind {
                    warn!(
                        "Allocator '{}' already exists as {}, ignoring requested {}",
                        name,
                        existing.kind(),
                        kind
                    );
                }
                Ok(Arc::clone(existing))
            }
            Entry::Vacant(entry) => {
                let allocator = Arc::new(AdvancedAllocator::new(
                    name.to_string(),
                    kind,
                    Arc::clone(&self.tracker),
                    total_size,
                    alignment,
                )?);
                info!(
                    "Allocator '{}' created: {} over {} bytes ({})",
                    name, kind, total_size, alignment
                );
                entry.insert(Arc::clone(&allocator));
                Ok(allocator)
            }
        }
    }

    /// Drop `name` from the table; outstanding handles stay usable
    pub fn remove(&self, name: &str) -> Option<Arc<AdvancedAllocator>> {
        self.instances.remove(name).map(|(_, allocator)| allocator)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.instances.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Reset and drop every instance, returning how many were registered
    pub fn shutdown(&self) -> usize {
        let names = self.names();
        let mut count = 0;
        for name in names {
            if let Some(allocator) = self.remove(&name) {
                if let Err(e) = allocator.reset() {
                    warn!("Allocator '{}' failed to reset on shutdown: {}", name, e);
                }
                count += 1;
            }
        }
        info!("Allocator registry shut down, {} instances released", count);
        count
    }
}

impl Drop for AllocatorRegistry {
    fn drop(&mut self) {
        if !self.instances.is_empty() {
            self.shutdown();
        }
    }
}
