/*!
 * Raw Memory Kernel - Demo Entry Point
 *
 * Builds a registry from `RAWMEM_*` configuration, drives every strategy
 * and a block pool once, and prints the resulting statistics as JSON.
 */

use std::sync::Arc;

use anyhow::Context;
use rawmem_kernel::{
    init_tracing, AllocatorRegistry, KernelConfig, MemoryPool, StrategyKind,
};
use serde_json::json;
use tracing::info;

/// Request sizes spanning every hybrid tier
const DEMO_SIZES: [usize; 4] = [64, 500, 5000, 100_000];
const DEMO_CAPACITY: usize = 4 * 1024 * 1024;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = KernelConfig::from_env().context("reading RAWMEM_* configuration")?;
    info!(?config, "Raw memory kernel starting");

    let registry = AllocatorRegistry::from_config(&config)?;
    let mut reports = Vec::new();

    for kind in StrategyKind::ALL {
        let name = kind.to_string().to_lowercase();
        let allocator = registry.get_instance(&name, kind, DEMO_CAPACITY)?;

        let mut live = Vec::new();
        for size in DEMO_SIZES {
            match allocator.allocate(size) {
                Ok(memory) => live.push(memory),
                Err(e) => info!(allocator = %name, size, error = %e, "allocation refused"),
            }
        }
        let peak = allocator.stats();
        for memory in &live {
            allocator.free(memory)?;
        }

        reports.push(json!({
            "allocator": name,
            "peak": peak,
            "after_free": allocator.stats(),
        }));
    }

    let pool = MemoryPool::new(
        Arc::clone(registry.tracker()),
        config.pool_block_size,
        config.default_alignment,
        config.pool_max_size,
    )?;
    let block = pool.acquire()?;
    pool.release(block)?;
    let reused = pool.acquire()?;
    pool.release(reused)?;

    let leaks = registry.tracker().find_potential_leaks(config.leak_age());
    let report = json!({
        "strategies": reports,
        "pool": pool.stats(),
        "tracker": registry.tracker().stats(),
        "leak_candidates": leaks.len(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    let released = registry.shutdown();
    info!(released, "Raw memory kernel finished");
    Ok(())
}
