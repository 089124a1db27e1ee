use std::ptr::NonNull;

use tracing::{info, warn};

use crate::{config::AllocatorConfig, dump::FreeListDump, error::AllocError, heap::FibHeap};

enum State {
  Uninitialized,
  Ready(FibHeap),
  Released,
}

/// A Fibonacci buddy allocator over one arena.
///
/// The allocator is created empty; [`init`](Self::init) reserves the arena
/// and [`teardown`](Self::teardown) gives it back. Between the two,
/// [`allocate`](Self::allocate) and [`release`](Self::release) hand out and
/// take back blocks. Outside that window every operation fails with
/// [`AllocError::UseBeforeInit`] or [`AllocError::UseAfterTeardown`].
///
/// Single threaded: wrap it in a lock to share it.
pub struct FibonacciAllocator {
  state: State,
}

impl FibonacciAllocator {
  pub fn new() -> Self {
    Self {
      state: State::Uninitialized,
    }
  }

  /// Reserves an arena able to hold `length` bytes in blocks of
  /// `basic_block_size` bytes and returns the arena size actually reserved.
  ///
  /// The block size is raised to at least the header size and the block
  /// count is rounded up to a Fibonacci number, so the result is usually
  /// larger than `length`.
  pub fn init(
    &mut self,
    basic_block_size: usize,
    length: usize,
  ) -> Result<usize, AllocError> {
    if let State::Ready(_) = self.state {
      warn!("init on an allocator that is already initialized");
      return Err(AllocError::AlreadyInitialized);
    }

    let heap = FibHeap::new(basic_block_size, length)?;
    let arena_size = heap.arena_size();

    self.state = State::Ready(heap);

    Ok(arena_size)
  }

  pub fn init_with(
    &mut self,
    config: &AllocatorConfig,
  ) -> Result<usize, AllocError> {
    self.init(config.basic_block_size, config.arena_bytes)
  }

  /// Releases the arena. Addresses handed out earlier become dangling and
  /// every later call except `init` fails with `UseAfterTeardown`.
  pub fn teardown(&mut self) -> Result<(), AllocError> {
    let heap = self.heap()?;
    let arena_size = heap.arena_size();

    self.state = State::Released;
    info!(arena_size, "arena released");

    Ok(())
  }

  /// Hands out a block with room for `length` bytes.
  ///
  /// Fails with [`AllocError::Exhaustion`] when no free block is large
  /// enough; nothing is partially allocated in that case.
  pub fn allocate(
    &mut self,
    length: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    self.heap_mut()?.allocate(length)
  }

  /// Takes back a block returned by [`allocate`](Self::allocate) and merges
  /// it with its free buddies.
  ///
  /// Any address that is not a currently allocated block of this arena is
  /// rejected with [`AllocError::InvalidAddress`] and changes nothing.
  pub fn release(
    &mut self,
    address: *mut u8,
  ) -> Result<(), AllocError> {
    self.heap_mut()?.release(address)
  }

  /// Snapshot of every free bucket and of the allocation queue.
  pub fn dump_free_lists(&self) -> Result<FreeListDump, AllocError> {
    Ok(self.heap()?.dump())
  }

  pub fn is_ready(&self) -> bool {
    matches!(self.state, State::Ready(_))
  }

  pub fn arena_size(&self) -> Result<usize, AllocError> {
    Ok(self.heap()?.arena_size())
  }

  pub fn basic_block_size(&self) -> Result<usize, AllocError> {
    Ok(self.heap()?.basic_block_size())
  }

  pub fn total_blocks(&self) -> Result<usize, AllocError> {
    Ok(self.heap()?.total_blocks())
  }

  fn heap(&self) -> Result<&FibHeap, AllocError> {
    match &self.state {
      State::Ready(heap) => Ok(heap),
      State::Uninitialized => Err(not_ready(AllocError::UseBeforeInit)),
      State::Released => Err(not_ready(AllocError::UseAfterTeardown)),
    }
  }

  fn heap_mut(&mut self) -> Result<&mut FibHeap, AllocError> {
    match &mut self.state {
      State::Ready(heap) => Ok(heap),
      State::Uninitialized => Err(not_ready(AllocError::UseBeforeInit)),
      State::Released => Err(not_ready(AllocError::UseAfterTeardown)),
    }
  }
}

impl Default for FibonacciAllocator {
  fn default() -> Self {
    Self::new()
  }
}

fn not_ready(error: AllocError) -> AllocError {
  warn!(%error, "allocator is not ready");
  error
}
