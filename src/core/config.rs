/*!
 * Kernel Configuration
 *
 * Runtime configuration for the tracked allocator, pools, and the raw primitive
 */

use super::errors::{MemoryError, MemoryResult};
use super::limits::{DEFAULT_LEAK_AGE, DEFAULT_POOL_BLOCK_SIZE, DEFAULT_POOL_MAX_SIZE};
use crate::memory::AlignmentMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Memory layer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Alignment used when a caller does not pick one
    pub default_alignment: AlignmentMode,
    /// Optional byte cap on the raw primitive (None = unbounded)
    pub raw_budget: Option<usize>,
    /// Age after which live blocks are reported as leak candidates
    pub leak_age_ms: u64,
    /// Block size of the default pool
    pub pool_block_size: usize,
    /// Number of blocks the default pool keeps
    pub pool_max_size: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            default_alignment: AlignmentMode::Word,
            raw_budget: None,
            leak_age_ms: DEFAULT_LEAK_AGE.as_millis() as u64,
            pool_block_size: DEFAULT_POOL_BLOCK_SIZE,
            pool_max_size: DEFAULT_POOL_MAX_SIZE,
        }
    }
}

impl KernelConfig {
    /// Configuration for tests: small raw budget, immediate leak reporting
    pub fn constrained(budget: usize) -> Self {
        Self {
            raw_budget: Some(budget),
            leak_age_ms: 0,
            ..Default::default()
        }
    }

    /// Leak age as a duration
    pub fn leak_age(&self) -> Duration {
        Duration::from_millis(self.leak_age_ms)
    }

    /// Parse configuration from a JSON document; missing fields keep defaults
    pub fn from_json(json: &str) -> MemoryResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| MemoryError::invalid_argument(format!("invalid config: {}", e)))
    }

    /// Build configuration from `RAWMEM_*` environment variables
    ///
    /// Environment variables:
    /// - RAWMEM_ALIGNMENT: none | word | cache_line | page
    /// - RAWMEM_RAW_BUDGET: byte cap on the raw primitive
    /// - RAWMEM_LEAK_AGE_MS: leak candidate age in milliseconds
    /// - RAWMEM_POOL_BLOCK_SIZE / RAWMEM_POOL_MAX_SIZE: default pool shape
    pub fn from_env() -> MemoryResult<Self> {
        let mut config = Self::default();

        if let Some(value) = env_var("RAWMEM_ALIGNMENT") {
            config.default_alignment = value.parse()?;
        }
        if let Some(value) = env_var("RAWMEM_RAW_BUDGET") {
            config.raw_budget = Some(parse_number("RAWMEM_RAW_BUDGET", &value)?);
        }
        if let Some(value) = env_var("RAWMEM_LEAK_AGE_MS") {
            config.leak_age_ms = parse_number("RAWMEM_LEAK_AGE_MS", &value)? as u64;
        }
        if let Some(value) = env_var("RAWMEM_POOL_BLOCK_SIZE") {
            config.pool_block_size = parse_number("RAWMEM_POOL_BLOCK_SIZE", &value)?;
        }
        if let Some(value) = env_var("RAWMEM_POOL_MAX_SIZE") {
            config.pool_max_size = parse_number("RAWMEM_POOL_MAX_SIZE", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the allocators cannot honor
    pub fn validate(&self) -> MemoryResult<()> {
        if self.pool_block_size == 0 {
            return Err(MemoryError::invalid_argument("pool block size must be > 0"));
        }
        if self.pool_max_size == 0 {
            return Err(MemoryError::invalid_argument("pool max size must be > 0"));
        }
        if self.raw_budget == Some(0) {
            return Err(MemoryError::invalid_argument("raw budget must be > 0"));
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_number(name: &str, value: &str) -> MemoryResult<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| MemoryError::invalid_argument(format!("{} is not a number: {}", name, value)))
}
