//! Split engine.
//!
//! ```text
//!   before:  ┌──────────────────────── F(k) ────────────────────────┐
//!            │ parent (side s, inherited i)                         │
//!            └──────────────────────────────────────────────────────┘
//!
//!   after:   ┌────────────── F(k-1) ──────────────┬──── F(k-2) ─────┐
//!            │ left  (side L, inherited s)        │ right (R, i)    │
//!            └────────────────────────────────────┴─────────────────┘
//! ```

use tracing::trace;

use crate::{
  block::{BlockHeader, Side},
  fib::FibTerm,
  heap::FibHeap,
};

impl FibHeap {
  /// Replaces the free block `parent` with its two buddies and publishes both.
  ///
  /// Returns `(left, right)`, or `None` without touching anything when the
  /// parent is a single basic block or its header does not decode.
  ///
  /// # Safety
  ///
  /// `parent` must be a live, free header of this heap's free-list table.
  pub(crate) unsafe fn split(
    &mut self,
    parent: *mut BlockHeader,
  ) -> Option<(*mut BlockHeader, *mut BlockHeader)> {
    let (count, side, inherited) = unsafe {
      (
        (*parent).block_count(),
        (*parent).side()?,
        (*parent).inherited_side()?,
      )
    };

    let term = FibTerm::covering(count).filter(|term| term.value == count && term.is_splittable())?;
    let right_offset = self.offset_of(parent) + term.prev * self.basic_block_size;
    let right = self.arena.at(right_offset)? as *mut BlockHeader;
    let left = parent;

    unsafe {
      self.lists.withdraw(parent);

      left.write(BlockHeader::new(left, term.prev as u32, Side::Left, side));
      right.write(BlockHeader::new(right, term.prev2 as u32, Side::Right, inherited));

      self.lists.publish(left);
      self.lists.publish(right);
    }

    trace!(
      offset = self.offset_of(left),
      blocks = count,
      left = term.prev,
      right = term.prev2,
      "split"
    );

    Some((left, right))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn root_heap(blocks: usize) -> (FibHeap, *mut BlockHeader) {
    let heap = FibHeap::new(32, 32 * blocks).unwrap();
    let root = heap.lists.head(heap.lists.top_index());
    (heap, root)
  }

  #[test]
  fn test_split_yields_fibonacci_predecessors() {
    let (mut heap, root) = root_heap(13);
    let (left, right) = unsafe { heap.split(root) }.unwrap();

    unsafe {
      assert_eq!((*left).block_count(), 8);
      assert_eq!((*right).block_count(), 5);
      assert_eq!(
        (*left).block_count() + (*right).block_count(),
        heap.total_blocks()
      );

      assert_eq!(left, root);
      assert_eq!(heap.offset_of(right), 8 * 32);

      assert!((*left).is_free() && (*right).is_free());
    }

    assert!(heap.lists.is_empty(6));
    assert_eq!(heap.lists.head(5), left);
    assert_eq!(heap.lists.head(4), right);
  }

  #[test]
  fn test_split_propagates_sides() {
    let (mut heap, root) = root_heap(13);

    unsafe {
      let (left, right) = heap.split(root).unwrap();
      assert_eq!((*left).side(), Some(Side::Left));
      assert_eq!((*left).inherited_side(), Some(Side::Root));
      assert_eq!((*right).side(), Some(Side::Right));
      assert_eq!((*right).inherited_side(), Some(Side::Root));

      let (right_left, right_right) = heap.split(right).unwrap();
      assert_eq!((*right_left).inherited_side(), Some(Side::Right));
      assert_eq!((*right_right).inherited_side(), Some(Side::Root));

      let (left_left, left_right) = heap.split(left).unwrap();
      assert_eq!((*left_left).inherited_side(), Some(Side::Left));
      assert_eq!((*left_right).inherited_side(), Some(Side::Root));
    }
  }

  #[test]
  fn test_split_of_two_lands_both_children_in_bucket_one() {
    let (mut heap, root) = root_heap(2);
    let (left, right) = unsafe { heap.split(root) }.unwrap();

    assert_eq!(heap.lists.members(1).collect::<Vec<_>>(), vec![left, right]);
    assert!(heap.lists.is_empty(2));
  }

  #[test]
  fn test_single_block_cannot_split() {
    let (mut heap, root) = root_heap(1);

    assert!(unsafe { heap.split(root) }.is_none());
    assert_eq!(heap.lists.head(1), root);
  }
}
