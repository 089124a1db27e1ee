//! Diagnostic snapshot of the free-list table.

use std::fmt;

use serde::Serialize;

use crate::block::Side;

/// One block as seen on a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSummary {
  /// Byte offset of the header from the start of the arena.
  pub offset: usize,
  pub block_count: usize,
  pub bytes: usize,
  /// `None` when the header's side byte does not decode.
  pub side: Option<Side>,
  pub free: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketDump {
  pub index: usize,
  pub blocks: Vec<BlockSummary>,
}

/// Every free bucket, highest index first, plus the allocation queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FreeListDump {
  pub basic_block_size: usize,
  pub total_blocks: usize,
  pub buckets: Vec<BucketDump>,
  pub allocated: Vec<BlockSummary>,
}

impl FreeListDump {
  pub fn free_blocks(&self) -> usize {
    self
      .buckets
      .iter()
      .flat_map(|bucket| &bucket.blocks)
      .map(|block| block.block_count)
      .sum()
  }

  pub fn allocated_blocks(&self) -> usize {
    self.allocated.iter().map(|block| block.block_count).sum()
  }

  pub fn free_bytes(&self) -> usize {
    self.free_blocks() * self.basic_block_size
  }

  /// Free blocks as `(bucket, offset, block_count)`, sorted. Two dumps with
  /// the same shape hold the same free memory, whatever the list order.
  pub fn shape(&self) -> Vec<(usize, usize, usize)> {
    let mut shape: Vec<_> = self
      .buckets
      .iter()
      .flat_map(|bucket| {
        bucket
          .blocks
          .iter()
          .map(move |block| (bucket.index, block.offset, block.block_count))
      })
      .collect();
    shape.sort_unstable();
    shape
  }
}

impl fmt::Display for FreeListDump {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    for bucket in &self.buckets {
      if bucket.blocks.is_empty() {
        writeln!(f, "[{}]: Empty", bucket.index)?;
        continue;
      }

      write!(f, "[{}]: ", bucket.index)?;

      for block in &bucket.blocks {
        let side = block.side.map_or('?', Side::as_char);
        write!(f, "{}({}) -> ", block.bytes, side)?;
      }

      writeln!(f, "NULL")?;
    }

    if self.allocated.is_empty() {
      writeln!(f, "[0]: Empty")
    } else {
      write!(f, "[0]: ")?;

      for block in &self.allocated {
        write!(f, "{}@{:#x} -> ", block.bytes, block.offset)?;
      }

      writeln!(f, "NULL")
    }
  }
}
