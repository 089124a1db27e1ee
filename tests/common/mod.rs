//! Shared test setup.
//!
//! `RUST_LOG` filters the allocator's events, e.g.
//! `RUST_LOG=fiballoc=trace cargo test scenario` shows every split and merge.

#![allow(dead_code)]

use std::sync::Once;

use fiballoc::{BlockSummary, FreeListDump, fib};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs a test-friendly subscriber once per process.
pub fn init_tracing() {
  INIT.call_once(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_test_writer()
      .try_init();
  });
}

/// Every block, free or allocated, sorted by offset.
pub fn all_blocks(dump: &FreeListDump) -> Vec<BlockSummary> {
  let mut blocks: Vec<BlockSummary> = dump
    .buckets
    .iter()
    .flat_map(|bucket| bucket.blocks.iter().cloned())
    .chain(dump.allocated.iter().cloned())
    .collect();
  blocks.sort_by_key(|block| block.offset);
  blocks
}

/// Checks the structural invariants of a dump and returns a description of
/// the first violation.
pub fn check_invariants(dump: &FreeListDump) -> Result<(), String> {
  if dump.free_blocks() + dump.allocated_blocks() != dump.total_blocks {
    return Err(format!(
      "{} free + {} allocated != {} total",
      dump.free_blocks(),
      dump.allocated_blocks(),
      dump.total_blocks
    ));
  }

  for bucket in &dump.buckets {
    for block in &bucket.blocks {
      if !block.free {
        return Err(format!("allocated block at {:#x} on bucket {}", block.offset, bucket.index));
      }

      if fib::index_of(block.block_count) != bucket.index {
        return Err(format!(
          "block of {} at {:#x} on bucket {}",
          block.block_count, block.offset, bucket.index
        ));
      }
    }
  }

  if let Some(block) = dump.allocated.iter().find(|block| block.free) {
    return Err(format!("free block at {:#x} on the allocation queue", block.offset));
  }

  let mut expected_offset = 0;

  for block in all_blocks(dump) {
    if !fib::is_fibonacci(block.block_count) {
      return Err(format!("block at {:#x} holds {} blocks", block.offset, block.block_count));
    }

    if block.side.is_none() {
      return Err(format!("block at {:#x} has a corrupt side", block.offset));
    }

    if block.offset != expected_offset {
      return Err(format!("gap or overlap at {:#x}, expected {:#x}", block.offset, expected_offset));
    }

    expected_offset += block.bytes;
  }

  if expected_offset != dump.total_blocks * dump.basic_block_size {
    return Err(format!("blocks end at {:#x}", expected_offset));
  }

  Ok(())
}
