use std::env;

use serde::{Deserialize, Serialize};

/// Environment variable overriding [`AllocatorConfig::basic_block_size`].
pub const BLOCK_SIZE_VAR: &str = "FIBALLOC_BLOCK_SIZE";
/// Environment variable overriding [`AllocatorConfig::arena_bytes`].
pub const ARENA_BYTES_VAR: &str = "FIBALLOC_ARENA_BYTES";

/// Parameters for [`crate::FibonacciAllocator::init_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
  /// Minimal allocation granule. Clamped up to the header size at init.
  pub basic_block_size: usize,
  /// Requested arena length, rounded up to a Fibonacci number of blocks.
  pub arena_bytes: usize,
}

impl Default for AllocatorConfig {
  fn default() -> Self {
    Self {
      basic_block_size: 256,
      arena_bytes: 1 << 20,
    }
  }
}

impl AllocatorConfig {
  /// Defaults overridden by `FIBALLOC_BLOCK_SIZE` and `FIBALLOC_ARENA_BYTES`.
  /// Values that do not parse are ignored.
  pub fn from_env() -> Self {
    Self::from_lookup(|key| env::var(key).ok())
  }

  fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
    let mut config = Self::default();
    let parse = |key: &str| lookup(key).and_then(|value| value.trim().parse::<usize>().ok());

    if let Some(size) = parse(BLOCK_SIZE_VAR) {
      config.basic_block_size = size;
    }

    if let Some(bytes) = parse(ARENA_BYTES_VAR) {
      config.arena_bytes = bytes;
    }

    config
  }
}
