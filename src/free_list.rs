//! Free-list table: one intrusive doubly linked list per Fibonacci index.
//!
//! ```text
//!   [0] allocation queue : A -> B -> NULL      (every allocated block)
//!   [1] 1 block          : Empty
//!   [2] 2 blocks         : x -> NULL
//!   [3] 3 blocks         : y -> z -> NULL
//!   ...
//!   [N] F(N) blocks      : root -> NULL        (right after init)
//! ```
//!
//! Links live in the block headers themselves. Insertion always appends, so
//! same-size requests are served in FIFO order.

use std::{marker::PhantomData, ptr};

use crate::{block::BlockHeader, fib};

/// Bucket reserved for blocks currently handed out to callers.
pub const ALLOCATION_QUEUE: usize = 0;

#[derive(Clone, Copy)]
struct List {
  head: *mut BlockHeader,
  tail: *mut BlockHeader,
}

impl List {
  const EMPTY: List = List {
    head: ptr::null_mut(),
    tail: ptr::null_mut(),
  };
}

pub struct FreeListTable {
  lists: Vec<List>,
}

impl FreeListTable {
  /// Table with buckets `1..=top_index` plus the allocation queue.
  pub fn new(top_index: usize) -> Self {
    Self {
      lists: vec![List::EMPTY; top_index + 1],
    }
  }

  /// Highest bucket index, the one holding the whole arena after init.
  pub fn top_index(&self) -> usize {
    self.lists.len() - 1
  }

  /// Number of lists including the allocation queue.
  pub fn len(&self) -> usize {
    self.lists.len()
  }

  /// First member of `index`, null when empty or out of range.
  pub fn head(
    &self,
    index: usize,
  ) -> *mut BlockHeader {
    self.lists.get(index).map_or(ptr::null_mut(), |list| list.head)
  }

  /// Last member of `index`, null when empty or out of range.
  pub fn tail(
    &self,
    index: usize,
  ) -> *mut BlockHeader {
    self.lists.get(index).map_or(ptr::null_mut(), |list| list.tail)
  }

  pub fn is_empty(
    &self,
    index: usize,
  ) -> bool {
    self.head(index).is_null()
  }

  /// Smallest non-empty free bucket at or above `index`.
  pub fn first_non_empty_from(
    &self,
    index: usize,
  ) -> Option<usize> {
    (index.max(1)..self.lists.len()).find(|&candidate| !self.is_empty(candidate))
  }

  /// Appends a free block to the bucket matching its size and marks it free.
  ///
  /// # Safety
  ///
  /// `header` must be a live header that is currently on no list.
  pub unsafe fn publish(
    &mut self,
    header: *mut BlockHeader,
  ) {
    unsafe {
      let index = fib::index_of((*header).block_count());
      self.append(index, header);
      (*header).set_free(true);
    }
  }

  /// Unlinks `header` from whichever list owns it: its size bucket when free,
  /// the allocation queue otherwise. Leaves the free flag untouched.
  ///
  /// # Safety
  ///
  /// `header` must be a live header that is currently on the list its free
  /// flag and size point at.
  pub unsafe fn withdraw(
    &mut self,
    header: *mut BlockHeader,
  ) {
    unsafe {
      let index = if (*header).is_free() {
        fib::index_of((*header).block_count())
      } else {
        ALLOCATION_QUEUE
      };
      self.unlink(index, header);
    }
  }

  /// Appends `header` to the allocation queue and marks it allocated.
  ///
  /// # Safety
  ///
  /// `header` must be a live header that is currently on no list.
  pub unsafe fn enqueue_allocated(
    &mut self,
    header: *mut BlockHeader,
  ) {
    unsafe {
      self.append(ALLOCATION_QUEUE, header);
      (*header).set_free(false);
    }
  }

  /// Unlinks `header` from the allocation queue.
  ///
  /// # Safety
  ///
  /// `header` must be a member of the allocation queue.
  pub unsafe fn dequeue_allocated(
    &mut self,
    header: *mut BlockHeader,
  ) {
    unsafe { self.unlink(ALLOCATION_QUEUE, header) }
  }

  /// Members of list `index` in order.
  pub fn members(
    &self,
    index: usize,
  ) -> Members<'_> {
    Members {
      current: self.head(index),
      _table: PhantomData,
    }
  }

  unsafe fn append(
    &mut self,
    index: usize,
    header: *mut BlockHeader,
  ) {
    debug_assert!(index < self.lists.len(), "bucket {index} out of range");
    let list = &mut self.lists[index];

    unsafe {
      (*header).next = ptr::null_mut();
      (*header).prev = list.tail;

      if list.tail.is_null() {
        list.head = header;
      } else {
        (*list.tail).next = header;
      }
    }

    list.tail = header;
  }

  unsafe fn unlink(
    &mut self,
    index: usize,
    header: *mut BlockHeader,
  ) {
    let list = &mut self.lists[index];

    unsafe {
      let prev = (*header).prev;
      let next = (*header).next;

      if prev.is_null() {
        list.head = next;
      } else {
        (*prev).next = next;
      }

      if next.is_null() {
        list.tail = prev;
      } else {
        (*next).prev = prev;
      }

      (*header).prev = ptr::null_mut();
      (*header).next = ptr::null_mut();
    }
  }
}

/// Iterator over the headers of one list.
pub struct Members<'a> {
  current: *mut BlockHeader,
  _table: PhantomData<&'a FreeListTable>,
}

impl Iterator for Members<'_> {
  type Item = *mut BlockHeader;

  fn next(&mut self) -> Option<Self::Item> {
    if self.current.is_null() {
      return None;
    }

    let header = self.current;
    self.current = unsafe { (*header).next };
    Some(header)
  }
}
