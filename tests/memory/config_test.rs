/*!
 * Configuration Tests
 * Environment and JSON configuration of the memory layer
 */

use rawmem_kernel::{AlignmentMode, AllocatorRegistry, ErrorKind, KernelConfig, StrategyKind};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::env;

const VARS: [&str; 5] = [
    "RAWMEM_ALIGNMENT",
    "RAWMEM_RAW_BUDGET",
    "RAWMEM_LEAK_AGE_MS",
    "RAWMEM_POOL_BLOCK_SIZE",
    "RAWMEM_POOL_MAX_SIZE",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_env_defaults() {
    clear_env();
    assert_eq!(KernelConfig::from_env().unwrap(), KernelConfig::default());
}

#[test]
#[serial]
fn test_env_overrides() {
    clear_env();
    env::set_var("RAWMEM_ALIGNMENT", "cache_line");
    env::set_var("RAWMEM_RAW_BUDGET", "65536");
    env::set_var("RAWMEM_POOL_MAX_SIZE", "4");

    let config = KernelConfig::from_env().unwrap();
    assert_eq!(config.default_alignment, AlignmentMode::CacheLine);
    assert_eq!(config.raw_budget, Some(65536));
    assert_eq!(config.pool_max_size, 4);
    clear_env();
}

#[test]
#[serial]
fn test_env_invalid_number() {
    clear_env();
    env::set_var("RAWMEM_RAW_BUDGET", "lots");
    let err = KernelConfig::from_env().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    clear_env();
}

#[test]
fn test_budget_from_config_limits_registry() {
    let config = KernelConfig::from_json(r#"{"raw_budget": 4096, "default_alignment": "none"}"#)
        .unwrap();
    let registry = AllocatorRegistry::from_config(&config).unwrap();
    assert_eq!(registry.tracker().budget(), Some(4096));

    registry.get_instance("fits", StrategyKind::Arena, 4096).unwrap();
    let err = registry.get_instance("too_big", StrategyKind::Arena, 1024).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfMemory);
}

#[test]
fn test_invalid_json() {
    let err = KernelConfig::from_json("{ not json").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}
