//! Property-based tests for the allocator.
//!
//! Random interleavings of allocations and releases must never break the
//! block accounting, and releasing everything must always restore the
//! single root block.

mod common;

use std::ptr::NonNull;

use fiballoc::{AllocError, FibonacciAllocator};
use proptest::prelude::*;

const BLOCK_SIZE: usize = 32;
const ARENA_BYTES: usize = 32 * 610;

#[derive(Debug, Clone)]
enum Op {
  Allocate(usize),
  Release(usize),
}

// ============================================================================
//  Strategies
// ============================================================================

fn op() -> impl Strategy<Value = Op> {
  prop_oneof![
    3 => (0usize..6000).prop_map(Op::Allocate),
    2 => any::<usize>().prop_map(Op::Release),
  ]
}

fn op_sequence(max: usize) -> impl Strategy<Value = Vec<Op>> {
  prop::collection::vec(op(), 0..=max)
}

fn ready() -> FibonacciAllocator {
  common::init_tracing();

  let mut allocator = FibonacciAllocator::new();
  allocator.init(BLOCK_SIZE, ARENA_BYTES).unwrap();
  allocator
}

/// Applies `ops`, tracking the addresses currently allocated in `live`.
fn run(
  allocator: &mut FibonacciAllocator,
  live: &mut Vec<NonNull<u8>>,
  ops: &[Op],
) -> Result<(), TestCaseError> {
  for op in ops {
    match *op {
      Op::Allocate(length) => match allocator.allocate(length) {
        Ok(address) => live.push(address),
        Err(AllocError::Exhaustion { .. }) => {}
        Err(error) => return Err(TestCaseError::fail(format!("allocate({length}): {error}"))),
      },
      Op::Release(pick) if !live.is_empty() => {
        let address = live.swap_remove(pick % live.len());
        allocator
          .release(address.as_ptr())
          .map_err(|error| TestCaseError::fail(format!("release: {error}")))?;
      }
      Op::Release(_) => {}
    }
  }

  Ok(())
}

proptest! {
  /// Free plus allocated blocks always tile the arena with Fibonacci sizes.
  #[test]
  fn blocks_are_conserved(ops in op_sequence(60)) {
    let mut allocator = ready();
    let mut live = Vec::new();

    for chunk in ops.chunks(5) {
      run(&mut allocator, &mut live, chunk)?;

      let dump = allocator.dump_free_lists().unwrap();
      prop_assert_eq!(common::check_invariants(&dump), Ok(()));
    }
  }

  /// Allocating and immediately releasing restores the same free blocks.
  #[test]
  fn allocate_then_release_round_trips(setup in op_sequence(40), length in 0usize..20000) {
    let mut allocator = ready();
    run(&mut allocator, &mut Vec::new(), &setup)?;

    let before = allocator.dump_free_lists().unwrap();

    match allocator.allocate(length) {
      Ok(address) => allocator.release(address.as_ptr()).unwrap(),
      Err(AllocError::Exhaustion { .. }) => {}
      Err(error) => return Err(TestCaseError::fail(error.to_string())),
    }

    let after = allocator.dump_free_lists().unwrap();
    prop_assert_eq!(before.shape(), after.shape());
    prop_assert_eq!(before.free_bytes(), after.free_bytes());
  }

  /// Releasing every live block, in any order, merges back to the root.
  #[test]
  fn releasing_everything_coalesces_to_root(
    setup in op_sequence(60),
    picks in prop::collection::vec(any::<usize>(), 60),
  ) {
    let mut allocator = ready();
    let mut live = Vec::new();
    run(&mut allocator, &mut live, &setup)?;

    for pick in picks.iter().cycle().take(live.len()) {
      let address = live.swap_remove(pick % live.len());
      allocator.release(address.as_ptr()).unwrap();
    }

    let dump = allocator.dump_free_lists().unwrap();
    prop_assert_eq!(dump.shape(), vec![(14, 0, 610)]);
    prop_assert!(dump.allocated.is_empty());
  }

  /// Once full, every further request fails and nothing changes.
  #[test]
  fn exhaustion_is_clean(lengths in prop::collection::vec(0usize..3000, 1..40)) {
    let mut allocator = ready();

    while allocator.allocate(0).is_ok() {}

    let before = allocator.dump_free_lists().unwrap();
    prop_assert_eq!(before.free_blocks(), 0);

    for length in lengths {
      let is_exhausted = matches!(allocator.allocate(length), Err(AllocError::Exhaustion { .. }));
      prop_assert!(is_exhausted);
    }

    prop_assert_eq!(allocator.dump_free_lists().unwrap(), before);
  }
}
