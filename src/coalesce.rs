//! Coalesce engine.
//!
//! A free block finds its buddy by address arithmetic alone:
//!
//! ```text
//!   left block, size F(k):    [ block F(k) ][ buddy F(k-1) ]
//!                             ^ block       ^ block + F(k)
//!
//!   right block, size F(k):   [ buddy F(k+1) ][ block F(k) ]
//!                             ^ block - (F(k) + F(k-1))
//! ```
//!
//! A right block of one basic block is the one ambiguous case: it is the
//! right child of either a 3-block parent (buddy of two blocks) or a 2-block
//! parent (buddy of one block), so both positions are probed.
//!
//! A probe that lands outside the arena or on a header whose tag does not
//! validate simply ends the merge.

use tracing::trace;

use crate::{
  block::{BlockHeader, Side},
  fib::FibTerm,
  heap::FibHeap,
};

impl FibHeap {
  /// Performs one merge step for the free block `block`.
  ///
  /// Returns the merged block, which is `block` itself when it was the left
  /// buddy and its left buddy otherwise, or `None` when no merge applies.
  /// Callers loop on the returned handle until `None` to cascade the merge
  /// up the split tree.
  ///
  /// # Safety
  ///
  /// `block` must be a live, free header of this heap's free-list table.
  pub(crate) unsafe fn coalesce(
    &mut self,
    block: *mut BlockHeader,
  ) -> Option<*mut BlockHeader> {
    match unsafe { (*block).side() }? {
      Side::Root => None,
      Side::Left => unsafe { self.merge_with_right(block) },
      Side::Right => unsafe { self.merge_with_left(block) },
    }
  }

  unsafe fn merge_with_right(
    &mut self,
    left: *mut BlockHeader,
  ) -> Option<*mut BlockHeader> {
    let count = unsafe { (*left).block_count() };
    let expected = FibTerm::covering(count)?.prev;
    let buddy_offset = self.offset_of(left) + count * self.basic_block_size;
    let buddy = self.free_buddy_at(buddy_offset, expected, Side::Right)?;

    unsafe { self.merge(left, buddy) }.then_some(left)
  }

  unsafe fn merge_with_left(
    &mut self,
    right: *mut BlockHeader,
  ) -> Option<*mut BlockHeader> {
    let count = unsafe { (*right).block_count() };
    let term = FibTerm::covering(count)?;
    let offset = self.offset_of(right);

    // Either probe may land inside an allocated payload. User bytes there only
    // match if they hold the tag keyed to that exact address, a free flag, a
    // left side and the expected size, so the order of the two probes does
    // not matter.
    let candidates = [Some(count + term.prev), (count == 1).then_some(1)];

    let buddy = candidates.into_iter().flatten().find_map(|expected| {
      let buddy_offset = offset.checked_sub(expected * self.basic_block_size)?;
      self.free_buddy_at(buddy_offset, expected, Side::Left)
    })?;

    unsafe { self.merge(buddy, right) }.then_some(buddy)
  }

  /// The header at `offset`, provided it validates, is free, sits on the
  /// expected side and holds exactly `expected` blocks.
  fn free_buddy_at(
    &self,
    offset: usize,
    expected: usize,
    side: Side,
  ) -> Option<*mut BlockHeader> {
    let buddy = self.header_at(offset)?;

    let matches = self.is_live(buddy)
      && unsafe { (*buddy).is_free() && (*buddy).block_count() == expected && (*buddy).side() == Some(side) };

    matches.then_some(buddy)
  }

  /// Folds `right` into `left`. The left header survives and takes back the
  /// parent's sides: `side` from its own inherited bit, `inherited_side`
  /// from the right buddy's. Returns `false`, merging nothing, when either
  /// inherited bit does not decode.
  unsafe fn merge(
    &mut self,
    left: *mut BlockHeader,
    right: *mut BlockHeader,
  ) -> bool {
    unsafe {
      let (Some(parent_side), Some(parent_inherited)) = ((*left).inherited_side(), (*right).inherited_side()) else {
        return false;
      };

      self.lists.withdraw(left);
      self.lists.withdraw(right);

      (*left).block_count += (*right).block_count;
      (*left).set_side(parent_side);
      (*left).set_inherited_side(parent_inherited);
      BlockHeader::invalidate(right);

      self.lists.publish(left);

      trace!(
        offset = self.offset_of(left),
        blocks = (*left).block_count(),
        side = %parent_side,
        "merged"
      );
    }

    true
  }
}
