//! Errors reported by the allocator.
//!
//! Every condition here is local to the call that produced it; the allocator
//! never aborts the process on its own.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
  /// No free block of sufficient size. Recoverable after releasing memory.
  ///
  /// `blocks` is zero when the request is too large to size at all.
  #[error("out of memory: {requested} bytes ({blocks} basic blocks) requested")]
  Exhaustion { requested: usize, blocks: usize },

  /// The address was not produced by this allocator, or was already released.
  #[error("invalid address {address:#x}: not an allocated block of this arena")]
  InvalidAddress { address: usize },

  /// The arena could not be reserved.
  #[error("allocator initialization failed: {cause}")]
  Initialization { cause: String },

  #[error("allocator used before init")]
  UseBeforeInit,

  #[error("allocator used after teardown")]
  UseAfterTeardown,

  #[error("allocator is already initialized")]
  AlreadyInitialized,

  /// A free-list head failed tag validation.
  #[error("corrupted block header at arena offset {offset:#x}")]
  Corrupted { offset: usize },
}
