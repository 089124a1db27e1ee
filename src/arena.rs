use std::ptr::{self, NonNull};

use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, c_void, mmap, munmap};

use crate::error::AllocError;

/// One contiguous, private, anonymous mapping. Released as a unit on drop.
///
/// The mapping is page aligned and zero filled, so every block boundary is
/// suitably aligned for a header and every byte is initialized before the
/// first header is written.
pub struct Arena {
  base: NonNull<u8>,
  len: usize,
}

impl Arena {
  pub fn reserve(len: usize) -> Result<Self, AllocError> {
    if len == 0 {
      return Err(AllocError::Initialization {
        cause: "arena length must be positive".into(),
      });
    }

    let address = unsafe {
      mmap(
        ptr::null_mut(),
        len,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if address == MAP_FAILED {
      return Err(AllocError::Initialization {
        cause: format!("mmap of {len} bytes failed: {}", std::io::Error::last_os_error()),
      });
    }

    let base = NonNull::new(address as *mut u8).ok_or_else(|| AllocError::Initialization {
      cause: "mmap returned a null mapping".into(),
    })?;

    Ok(Self { base, len })
  }

  pub fn base(&self) -> *mut u8 {
    self.base.as_ptr()
  }

  pub fn len(&self) -> usize {
    self.len
  }

  /// Byte offset of `address` from the start of the arena, if it lies inside.
  pub fn offset_of(
    &self,
    address: *const u8,
  ) -> Option<usize> {
    let offset = (address as usize).checked_sub(self.base() as usize)?;
    (offset < self.len).then_some(offset)
  }

  /// Address of the byte at `offset`, if it lies inside the arena.
  pub fn at(
    &self,
    offset: usize,
  ) -> Option<*mut u8> {
    (offset < self.len).then(|| unsafe { self.base().add(offset) })
  }
}

impl Drop for Arena {
  fn drop(&mut self) {
    let result = unsafe { munmap(self.base.as_ptr() as *mut c_void, self.len) };

    if result != 0 {
      tracing::warn!(
        len = self.len,
        error = %std::io::Error::last_os_error(),
        "munmap of arena failed"
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_reserve_is_zeroed_and_writable() {
    let arena = Arena::reserve(4096).unwrap();

    unsafe {
      for offset in 0..arena.len() {
        assert_eq!(*arena.base().add(offset), 0);
      }

      *arena.base().add(4095) = 0xAB;
      assert_eq!(*arena.base().add(4095), 0xAB);
    }
  }

  #[test]
  fn test_reserve_zero_fails() {
    assert!(matches!(Arena::reserve(0), Err(AllocError::Initialization { .. })));
  }

  #[test]
  fn test_offsets_are_bounded() {
    let arena = Arena::reserve(100).unwrap();
    let base = arena.base();

    assert_eq!(arena.offset_of(base), Some(0));
    assert_eq!(arena.offset_of(unsafe { base.add(99) }), Some(99));
    assert_eq!(arena.offset_of(unsafe { base.add(100) }), None);
    assert_eq!(arena.offset_of(ptr::null()), None);

    assert_eq!(arena.at(99), Some(unsafe { base.add(99) }));
    assert_eq!(arena.at(100), None);
  }
}
