//! The engine behind a ready allocator: one arena, its free-list table and the
//! basic block size, plus the allocate and release paths that drive the split
//! and coalesce engines.

use std::ptr::NonNull;

use tracing::{debug, info, trace, warn};

use crate::{
  align, align_to,
  arena::Arena,
  block::{BlockHeader, HEADER_SIZE, Side},
  dump::{BlockSummary, BucketDump, FreeListDump},
  error::AllocError,
  fib::{self, FibTerm},
  free_list::{ALLOCATION_QUEUE, FreeListTable},
};

pub struct FibHeap {
  pub(crate) arena: Arena,
  pub(crate) lists: FreeListTable,
  pub(crate) basic_block_size: usize,
  total: FibTerm,
}

impl FibHeap {
  /// Reserves an arena of at least `length` bytes and seeds the top bucket
  /// with a single root block spanning all of it.
  pub fn new(
    basic_block_size: usize,
    length: usize,
  ) -> Result<Self, AllocError> {
    if length == 0 {
      return Err(AllocError::Initialization {
        cause: "requested arena length must be positive".into(),
      });
    }

    if basic_block_size > isize::MAX as usize / 2 {
      return Err(AllocError::Initialization {
        cause: format!("basic block size {basic_block_size} is too large"),
      });
    }

    let basic_block_size = align!(basic_block_size.max(HEADER_SIZE));

    let rounded = align_to!(length, basic_block_size).ok_or_else(|| AllocError::Initialization {
      cause: format!("arena length {length} overflows"),
    })?;

    let total = FibTerm::covering(rounded / basic_block_size)
      .filter(|term| term.value <= u32::MAX as usize)
      .ok_or_else(|| AllocError::Initialization {
        cause: format!("no representable Fibonacci block count covers {length} bytes"),
      })?;

    let arena_size = total
      .value
      .checked_mul(basic_block_size)
      .filter(|&size| size <= isize::MAX as usize)
      .ok_or_else(|| AllocError::Initialization {
        cause: format!("arena of {} blocks overflows", total.value),
      })?;

    let arena = Arena::reserve(arena_size)?;
    let mut lists = FreeListTable::new(total.index);

    let root = arena.base() as *mut BlockHeader;

    unsafe {
      root.write(BlockHeader::new(root, total.value as u32, Side::Root, Side::Root));
      lists.publish(root);
    }

    info!(
      requested = length,
      arena_size,
      available = arena_size - HEADER_SIZE,
      basic_block_size,
      blocks = total.value,
      fib_index = total.index,
      free_lists = lists.len(),
      "arena initialized"
    );

    Ok(Self {
      arena,
      lists,
      basic_block_size,
      total,
    })
  }

  pub fn arena_size(&self) -> usize {
    self.arena.len()
  }

  pub fn basic_block_size(&self) -> usize {
    self.basic_block_size
  }

  pub fn total_blocks(&self) -> usize {
    self.total.value
  }

  /// Size class serving a request of `length` bytes, header included.
  ///
  /// Anything that fits in one block alongside the header takes one block,
  /// anything that fits in two takes two, and larger requests take the
  /// Fibonacci number covering their block count.
  pub fn size_class(
    &self,
    length: usize,
  ) -> Option<FibTerm> {
    let with_header = length.checked_add(HEADER_SIZE)?;
    let rounded = align_to!(with_header, self.basic_block_size)?;
    FibTerm::covering(rounded / self.basic_block_size)
  }

  pub fn allocate(
    &mut self,
    length: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let exhausted = |blocks: usize| AllocError::Exhaustion {
      requested: length,
      blocks,
    };

    let Some(class) = self.size_class(length) else {
      warn!(length, "request size overflows the block arithmetic");
      return Err(exhausted(0));
    };

    let Some(found) = self.lists.first_non_empty_from(class.index) else {
      warn!(length, blocks = class.value, "no free block large enough");
      return Err(exhausted(class.value));
    };

    let head = self.lists.head(found);

    if !self.is_live(head) {
      return Err(AllocError::Corrupted {
        offset: self.offset_of(head),
      });
    }

    let header = if found == class.index {
      head
    } else {
      self.carve(head, class.index)?
    };

    unsafe {
      self.lists.withdraw(header);
      self.lists.enqueue_allocated(header);
    }

    let payload = unsafe { BlockHeader::payload(header) };

    debug!(
      length,
      blocks = class.value,
      bucket = class.index,
      from_bucket = found,
      offset = self.offset_of(header),
      "allocated"
    );

    NonNull::new(payload).ok_or(AllocError::Corrupted {
      offset: self.offset_of(header),
    })
  }

  /// Splits `block` repeatedly until a free block in bucket `target` exists
  /// and returns it.
  ///
  /// Every split lowers the left child's index by one and the right child's
  /// by two, so while two or more indices remain the right child is kept,
  /// and a final odd step keeps the left child.
  fn carve(
    &mut self,
    block: *mut BlockHeader,
    target: usize,
  ) -> Result<*mut BlockHeader, AllocError> {
    let mut block = block;
    let mut index = fib::index_of(unsafe { (*block).block_count() });

    while index > target {
      let offset = self.offset_of(block);
      let (left, right) = unsafe { self.split(block) }.ok_or(AllocError::Corrupted { offset })?;

      block = if index - target >= 2 { right } else { left };
      index = fib::index_of(unsafe { (*block).block_count() });
    }

    Ok(block)
  }

  pub fn release(
    &mut self,
    address: *mut u8,
  ) -> Result<(), AllocError> {
    let invalid = AllocError::InvalidAddress {
      address: address as usize,
    };

    let Some(header) = self.allocated_header(address) else {
      warn!(address = address as usize, "release of an address this arena did not hand out");
      return Err(invalid);
    };

    unsafe {
      self.lists.dequeue_allocated(header);
      self.lists.publish(header);
    }

    let mut block = header;
    let mut merges = 0usize;

    while let Some(merged) = unsafe { self.coalesce(block) } {
      block = merged;
      merges += 1;
    }

    debug!(
      offset = self.offset_of(header),
      merges,
      blocks = unsafe { (*block).block_count() },
      "released"
    );

    Ok(())
  }

  /// Maps a payload address back to its header, provided it names a block
  /// that is currently on the allocation queue.
  fn allocated_header(
    &self,
    address: *mut u8,
  ) -> Option<*mut BlockHeader> {
    let header_address = (address as usize).checked_sub(HEADER_SIZE)?;
    let offset = self.arena.offset_of(header_address as *const u8)?;
    let header = self.header_at(offset)?;

    if !self.is_live(header) || unsafe { (*header).is_free() } {
      return None;
    }

    self.is_queued(header).then_some(header)
  }

  /// Checks the header's neighbours on the allocation queue point back at it.
  fn is_queued(
    &self,
    header: *mut BlockHeader,
  ) -> bool {
    let (prev, next) = unsafe { ((*header).prev, (*header).next) };

    let prev_ok = if prev.is_null() {
      self.lists.head(ALLOCATION_QUEUE) == header
    } else {
      self
        .resolve(prev)
        .is_some_and(|prev| unsafe { (*prev).next } == header)
    };

    let next_ok = if next.is_null() {
      self.lists.tail(ALLOCATION_QUEUE) == header
    } else {
      self
        .resolve(next)
        .is_some_and(|next| unsafe { (*next).prev } == header)
    };

    prev_ok && next_ok
  }

  /// Re-derives a link pointer from the arena, if it names a tag-valid header.
  fn resolve(
    &self,
    header: *mut BlockHeader,
  ) -> Option<*mut BlockHeader> {
    let offset = self.arena.offset_of(header as *const u8)?;
    self.header_at(offset)
  }

  /// Tag-valid header at `offset`, if `offset` is a block boundary inside the
  /// arena. Never reads outside the arena.
  pub(crate) fn header_at(
    &self,
    offset: usize,
  ) -> Option<*mut BlockHeader> {
    if offset % self.basic_block_size != 0 {
      return None;
    }

    let header = self.arena.at(offset)? as *mut BlockHeader;
    unsafe { BlockHeader::is_valid(header) }.then_some(header)
  }

  /// Full consistency check of a tag-valid header: decodable sides and a
  /// Fibonacci size that stays inside the arena.
  pub(crate) fn is_live(
    &self,
    header: *mut BlockHeader,
  ) -> bool {
    let offset = self.offset_of(header);

    unsafe {
      if !BlockHeader::is_valid(header) {
        return false;
      }

      let count = (*header).block_count();
      let fits = count
        .checked_mul(self.basic_block_size)
        .and_then(|bytes| bytes.checked_add(offset))
        .is_some_and(|end| end <= self.arena.len());

      fits
        && fib::is_fibonacci(count)
        && (*header).side().is_some()
        && (*header).inherited_side().is_some()
    }
  }

  pub(crate) fn offset_of(
    &self,
    header: *const BlockHeader,
  ) -> usize {
    header as usize - self.arena.base() as usize
  }

  fn summarize(
    &self,
    header: *mut BlockHeader,
  ) -> BlockSummary {
    let (block_count, side, free) = unsafe { ((*header).block_count(), (*header).side(), (*header).is_free()) };

    BlockSummary {
      offset: self.offset_of(header),
      block_count,
      bytes: block_count * self.basic_block_size,
      side,
      free,
    }
  }

  pub fn dump(&self) -> FreeListDump {
    let buckets = (1..=self.lists.top_index())
      .rev()
      .map(|index| BucketDump {
        index,
        blocks: self.lists.members(index).map(|header| self.summarize(header)).collect(),
      })
      .collect();

    let allocated = self
      .lists
      .members(ALLOCATION_QUEUE)
      .map(|header| self.summarize(header))
      .collect();

    trace!(buckets = self.lists.len(), "free lists dumped");

    FreeListDump {
      basic_block_size: self.basic_block_size,
      total_blocks: self.total.value,
      buckets,
      allocated,
    }
  }
}
