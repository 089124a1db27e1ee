use std::{fmt, mem, ptr};

use serde::Serialize;

/// Constant mixed into every header tag. The stored tag is this value xor'd
/// with the header's own address, so a header image found anywhere other than
/// where it was written does not validate.
pub const HEADER_MAGIC: u32 = 0x1138_F1B0;

/// Bytes taken by the header at the front of every block.
pub const HEADER_SIZE: usize = mem::size_of::<BlockHeader>();

const FREE: u8 = b'Y';
const ALLOCATED: u8 = b'N';

/// Position of a block relative to the parent it was split from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum Side {
  /// The whole arena; has no buddy.
  Root = b'-',
  /// The larger, lower-address child.
  Left = b'L',
  /// The smaller, higher-address child.
  Right = b'R',
}

impl Side {
  fn from_raw(raw: u8) -> Option<Self> {
    match raw {
      b'-' => Some(Side::Root),
      b'L' => Some(Side::Left),
      b'R' => Some(Side::Right),
      _ => None,
    }
  }

  pub fn as_char(self) -> char {
    self as u8 as char
  }
}

impl fmt::Display for Side {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "{}", self.as_char())
  }
}

/// In-place metadata prefixed to every block in the arena, free or allocated.
///
/// `side` is where the block sits under its parent. `inherited_side` carries
/// one generation of ancestry: a left child inherits the parent's `side`, a
/// right child the parent's `inherited_side`. Merging a pair restores the
/// parent's `side` from the left child and its `inherited_side` from the
/// right child, so no parent pointer is ever stored.
///
/// The flag fields are kept as raw bytes: headers are read back from arena
/// memory that user code can scribble over, and a stray byte must decode to
/// "invalid" rather than to an impossible enum value.
#[repr(C)]
pub struct BlockHeader {
  pub tag: u32,
  pub block_count: u32,
  free: u8,
  side: u8,
  inherited_side: u8,
  pub prev: *mut BlockHeader,
  pub next: *mut BlockHeader,
}

impl BlockHeader {
  /// Builds an unlinked, allocated-state header meant to live at `at`.
  pub fn new(
    at: *const BlockHeader,
    block_count: u32,
    side: Side,
    inherited_side: Side,
  ) -> Self {
    Self {
      tag: Self::tag_for(at),
      block_count,
      free: ALLOCATED,
      side: side as u8,
      inherited_side: inherited_side as u8,
      prev: ptr::null_mut(),
      next: ptr::null_mut(),
    }
  }

  pub fn tag_for(at: *const BlockHeader) -> u32 {
    HEADER_MAGIC ^ (at as usize as u32)
  }

  /// Reads only the tag at `at` and checks it against the address.
  ///
  /// # Safety
  ///
  /// `at` must be aligned and point to at least `HEADER_SIZE` readable bytes.
  pub unsafe fn is_valid(at: *const BlockHeader) -> bool {
    let tag = unsafe { ptr::addr_of!((*at).tag).read() };
    tag == Self::tag_for(at)
  }

  /// Wipes the tag so the header no longer validates.
  ///
  /// # Safety
  ///
  /// `at` must point to a header inside the arena.
  pub unsafe fn invalidate(at: *mut BlockHeader) {
    unsafe { ptr::addr_of_mut!((*at).tag).write(0) };
  }

  /// First byte after the header, as handed to the caller.
  ///
  /// # Safety
  ///
  /// `at` must point to a header inside the arena.
  pub unsafe fn payload(at: *mut BlockHeader) -> *mut u8 {
    unsafe { (at as *mut u8).add(HEADER_SIZE) }
  }

  pub fn block_count(&self) -> usize {
    self.block_count as usize
  }

  pub fn is_free(&self) -> bool {
    self.free == FREE
  }

  pub fn set_free(
    &mut self,
    free: bool,
  ) {
    self.free = if free { FREE } else { ALLOCATED };
  }

  /// Decoded `side`, `None` if the byte is corrupt.
  pub fn side(&self) -> Option<Side> {
    Side::from_raw(self.side)
  }

  pub fn set_side(
    &mut self,
    side: Side,
  ) {
    self.side = side as u8;
  }

  /// Decoded `inherited_side`, `None` if the byte is corrupt.
  pub fn inherited_side(&self) -> Option<Side> {
    Side::from_raw(self.inherited_side)
  }

  pub fn set_inherited_side(
    &mut self,
    side: Side,
  ) {
    self.inherited_side = side as u8;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_header_fits_a_basic_block() {
    assert_eq!(HEADER_SIZE % mem::align_of::<usize>(), 0);
    assert!(HEADER_SIZE <= 32);
  }

  #[test]
  fn test_tag_is_keyed_by_address() {
    let mut slots = [
      mem::MaybeUninit::<BlockHeader>::zeroed(),
      mem::MaybeUninit::<BlockHeader>::zeroed(),
    ];
    let first = slots[0].as_mut_ptr();
    let second = slots[1].as_mut_ptr();

    unsafe {
      first.write(BlockHeader::new(first, 5, Side::Left, Side::Root));

      assert!(BlockHeader::is_valid(first));
      assert!(!BlockHeader::is_valid(second));

      second.write(first.read());
      assert!(!BlockHeader::is_valid(second));

      BlockHeader::invalidate(first);
      assert!(!BlockHeader::is_valid(first));
    }
  }

  #[test]
  fn test_corrupt_side_decodes_to_none() {
    let mut slot = mem::MaybeUninit::<BlockHeader>::zeroed();
    let at = slot.as_mut_ptr();

    unsafe {
      at.write(BlockHeader::new(at, 3, Side::Right, Side::Left));
      assert_eq!((*at).side(), Some(Side::Right));
      assert_eq!((*at).inherited_side(), Some(Side::Left));

      (*at).side = 0x7f;
      assert_eq!((*at).side(), None);
    }
  }

  #[test]
  fn test_free_flag() {
    let mut slot = mem::MaybeUninit::<BlockHeader>::zeroed();
    let at = slot.as_mut_ptr();

    unsafe {
      at.write(BlockHeader::new(at, 1, Side::Root, Side::Root));
      assert!(!(*at).is_free());

      (*at).set_free(true);
      assert!((*at).is_free());
    }
  }

  #[test]
  fn test_side_display() {
    assert_eq!(Side::Left.to_string(), "L");
    assert_eq!(Side::Right.to_string(), "R");
    assert_eq!(Side::Root.to_string(), "-");
  }
}
