//! The chunk header and the arithmetic for moving between a chunk and its
//! payload (§3). Per §9's design note, every other module works with
//! `*mut Chunk` handles handed back from here; nothing outside this file
//! computes a header offset by hand.

use std::mem;

/// Header immediately preceding every chunk's payload bytes.
///
/// `size_of::<Chunk>()` is 32 bytes on a 64-bit target (two pointers, a
/// `usize`, and a padded `bool`) — already a multiple of the 16-byte
/// alignment quantum, so a chunk store built from an aligned base stays
/// aligned through every split, merge, and extension without extra padding.
#[repr(C)]
pub(crate) struct Chunk {
  /// Payload length in bytes, excluding this header. Multiple of 16.
  /// Zero only for the tail sentinel.
  pub size: usize,
  /// Next chunk in ascending address order. `null` only for the tail.
  pub next: *mut Chunk,
  /// Previous chunk. `null` only for the head.
  pub prev: *mut Chunk,
  /// Whether the payload is available for allocation.
  pub free: bool,
}

impl Chunk {
  pub(crate) const HEADER_SIZE: usize = mem::size_of::<Chunk>();

  /// The payload address for a chunk at `chunk`.
  ///
  /// # Safety
  ///
  /// `chunk` must point to a live `Chunk` header.
  #[inline]
  pub(crate) unsafe fn payload(chunk: *mut Chunk) -> *mut u8 {
    unsafe { (chunk as *mut u8).add(Self::HEADER_SIZE) }
  }

  /// Recovers a chunk header from a payload pointer previously handed to a
  /// caller by [`Self::payload`].
  ///
  /// # Safety
  ///
  /// `ptr` must have been produced by this allocator's `payload` and must
  /// not have been freed and reused for an incompatible layout since.
  #[inline]
  pub(crate) unsafe fn from_payload(ptr: *mut u8) -> *mut Chunk {
    unsafe { ptr.sub(Self::HEADER_SIZE) as *mut Chunk }
  }

  /// One past the last payload byte of the chunk at `chunk`.
  ///
  /// # Safety
  ///
  /// `chunk` must point to a live `Chunk` header with an initialized `size`.
  #[inline]
  pub(crate) unsafe fn end(chunk: *mut Chunk) -> *mut u8 {
    unsafe { Self::payload(chunk).add((*chunk).size) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn header_size_is_quantum_aligned() {
    assert_eq!(Chunk::HEADER_SIZE % 16, 0);
  }

  #[test]
  fn payload_and_from_payload_round_trip() {
    let mut storage = [0u8; 128];
    let chunk = storage.as_mut_ptr() as *mut Chunk;
    unsafe {
      (*chunk).size = 64;
      (*chunk).next = std::ptr::null_mut();
      (*chunk).prev = std::ptr::null_mut();
      (*chunk).free = true;

      let payload = Chunk::payload(chunk);
      assert_eq!(payload as usize, chunk as usize + Chunk::HEADER_SIZE);
      assert_eq!(Chunk::from_payload(payload), chunk);
      assert_eq!(Chunk::end(chunk), payload.add(64));
    }
  }
}
