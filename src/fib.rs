//! Fibonacci index arithmetic.
//!
//! Block sizes follow the sequence `1, 2, 3, 5, 8, 13, ...` (the classic
//! `0, 1, 1, 2, ...` with the leading zero and the duplicated one folded away).
//! The 1-based position of a term in that sequence is its *index*, and the
//! index doubles as the free-list bucket selector:
//!
//! ```text
//!   index:  1   2   3   4   5   6    7    8    9
//!   value:  1   2   3   5   8   13   21   34   55
//! ```
//!
//! The two terms preceding a value are what the split and coalesce engines
//! need to size siblings, so they are returned alongside it.

/// One term of the block-size sequence together with its two predecessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FibTerm {
  /// 1-based position in the sequence, also the free-list bucket.
  pub index: usize,
  /// The Fibonacci number itself.
  pub value: usize,
  /// The term right before `value`, i.e. the size of a left child.
  pub prev: usize,
  /// The term before `prev`, i.e. the size of a right child.
  pub prev2: usize,
}

impl FibTerm {
  /// Returns the smallest term `>= min`. A `min` of zero is treated as one.
  ///
  /// Returns `None` when no term representable in `usize` covers `min`.
  ///
  /// ```rust
  /// use fiballoc::fib::FibTerm;
  ///
  /// let term = FibTerm::covering(2970).unwrap();
  /// assert_eq!((term.index, term.value), (18, 4181));
  /// assert_eq!((term.prev, term.prev2), (2584, 1597));
  /// ```
  pub fn covering(min: usize) -> Option<Self> {
    let min = min.max(1);

    let mut before: usize = 0;
    let mut current: usize = 1;
    let mut value: usize;
    let mut index: usize = 0;

    loop {
      value = before.checked_add(current)?;
      before = current;
      current = value;
      index += 1;

      if value >= min {
        break;
      }
    }

    Some(Self {
      index,
      value,
      prev: before,
      prev2: value - before,
    })
  }

  /// Whether a block of this size can be split into two Fibonacci buddies.
  pub fn is_splittable(&self) -> bool {
    self.prev2 > 0
  }
}

/// Bucket index of a block holding `block_count` basic blocks.
///
/// Non-Fibonacci counts map to the bucket of the next larger term.
pub fn index_of(block_count: usize) -> usize {
  FibTerm::covering(block_count).map_or(usize::MAX, |term| term.index)
}

/// Whether `value` is a term of the block-size sequence.
pub fn is_fibonacci(value: usize) -> bool {
  value > 0 && FibTerm::covering(value).is_some_and(|term| term.value == value)
}
