/// Calculates the machine word alignment for the given size.
///
/// Block headers hold pointers, so every basic block size is passed through
/// this macro to keep headers word aligned at every block boundary.
///
/// # Examples
///
/// ```rust
/// use fiballoc::align;
///
/// match std::mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + ::core::mem::size_of::<usize>() - 1) & !(::core::mem::size_of::<usize>() - 1)
  };
}

/// Rounds `value` up to the next multiple of `granule`, which does not need to
/// be a power of two. Evaluates to `None` on overflow.
///
/// ```rust
/// use fiballoc::align_to;
///
/// assert_eq!(align_to!(95000usize, 32usize), Some(95008));
/// assert_eq!(align_to!(64usize, 32usize), Some(64));
/// assert_eq!(align_to!(usize::MAX, 32usize), None);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $granule:expr) => {
    ($value)
      .checked_add($granule - 1)
      .map(|padded: usize| padded / $granule * $granule)
  };
}
