//! The process-wide heap: serialization (§5) plus lazy initialization
//! (§4.2), tying the chunk store to the placement engine in
//! [`crate::placement`]. This is the only module that holds the mutex, and
//! the only place `HeapState`'s fields are visible.

use std::cell::UnsafeCell;
use std::ptr;

use crate::align::align_up;
use crate::brk;
use crate::chunk::Chunk;
use crate::config::{ALIGN_QUANTUM, INITIAL_PAGES};
use crate::error::HeapError;
use crate::placement;

/// Process-wide arena state, guarded by `Heap::mutex`.
struct HeapState {
  head: *mut Chunk,
  tail: *mut Chunk,
  page_size: usize,
  initialized: bool,
}

/// The single heap instance. §9: "head, tail, page size, and mutex are
/// process-wide and initialized lazily on first entry" — the mutex itself
/// needs no once-gate (`PTHREAD_MUTEX_INITIALIZER` is valid at rest), only
/// the arena state behind it does, which [`Heap::ensure_initialized`] checks
/// on every lock acquisition.
pub(crate) struct Heap {
  mutex: UnsafeCell<libc::pthread_mutex_t>,
  state: UnsafeCell<HeapState>,
}

// SAFETY: every access to `state` happens with `mutex` held; `mutex` itself
// is a plain (non-recursive) pthread mutex, safe to share across threads.
unsafe impl Sync for Heap {}

pub(crate) static HEAP: Heap = Heap {
  mutex: UnsafeCell::new(libc::PTHREAD_MUTEX_INITIALIZER),
  state: UnsafeCell::new(HeapState {
    head: ptr::null_mut(),
    tail: ptr::null_mut(),
    page_size: 0,
    initialized: false,
  }),
};

/// RAII guard releasing the heap's mutex on drop, so every early return from
/// a locked section still unlocks.
struct LockGuard<'a> {
  mutex: &'a UnsafeCell<libc::pthread_mutex_t>,
}

impl Drop for LockGuard<'_> {
  fn drop(&mut self) {
    let rc = unsafe { libc::pthread_mutex_unlock(self.mutex.get()) };
    debug_assert_eq!(rc, 0, "pthread_mutex_unlock failed");
  }
}

impl Heap {
  /// Runs `f` with the heap's mutex held and the arena lazily initialized.
  ///
  /// The mutex is non-recursive (§5): `f` must not call back into any
  /// other `Heap` method.
  fn with_state<R>(&self, f: impl FnOnce(&mut HeapState) -> Result<R, HeapError>) -> Result<R, HeapError> {
    let rc = unsafe { libc::pthread_mutex_lock(self.mutex.get()) };
    debug_assert_eq!(rc, 0, "pthread_mutex_lock failed");
    let _guard = LockGuard { mutex: &self.mutex };

    let state = unsafe { &mut *self.state.get() };
    ensure_initialized(state)?;
    f(state)
  }

  /// Allocates `size` bytes at the default 16-byte alignment (§6 `allocate`).
  pub(crate) fn allocate(&self, size: usize) -> Result<*mut u8, HeapError> {
    self.allocate_aligned(ALIGN_QUANTUM, size)
  }

  /// Allocates `size` bytes at alignment `align` (§6 `aligned-allocate`).
  pub(crate) fn allocate_aligned(&self, align: usize, size: usize) -> Result<*mut u8, HeapError> {
    if align == 0 || !align.is_power_of_two() {
      return Err(HeapError::InvalidArgument);
    }
    let rounded = round_size(size)?;

    self.with_state(|state| {
      if align <= ALIGN_QUANTUM {
        allocate_quantum_aligned(state, rounded)
      } else if align > state.page_size {
        Err(HeapError::Unsupported)
      } else {
        allocate_wide_aligned(state, rounded, align)
      }
    })
  }

  /// Releases `ptr`. No-op on a null pointer (§6 `release`).
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a pointer this heap previously returned, not yet
  /// released.
  pub(crate) unsafe fn release(&self, ptr: *mut u8) {
    if ptr.is_null() {
      return;
    }
    let _ = self.with_state(|_state| {
      unsafe { placement::release(ptr) };
      Ok(())
    });
  }

  /// Reallocates `ptr` to `size` bytes (§4.4, §6 `reallocate`).
  ///
  /// `ptr == null` behaves like [`Self::allocate`]. The growth-with-
  /// relocation branch releases the mutex before calling back into
  /// `allocate`/`release`, honoring §5's ban on recursive locking.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a pointer this heap previously returned, not yet
  /// released.
  pub(crate) unsafe fn reallocate(&self, ptr: *mut u8, size: usize) -> Result<*mut u8, HeapError> {
    if ptr.is_null() {
      return self.allocate(size);
    }
    if size == 0 {
      // §4.4: "A zero new size is equivalent to release and returns
      // none." Distinct from `allocate(0)`, which is free to return a
      // minimal live pointer instead.
      unsafe { self.release(ptr) };
      return Ok(ptr::null_mut());
    }
    let rounded = round_size(size)?;

    enum Outcome {
      Done(*mut u8),
      Relocate { old_size: usize },
    }

    let outcome = self.with_state(|_state| {
      let chunk = unsafe { Chunk::from_payload(ptr) };
      let old_size = unsafe { (*chunk).size };

      if rounded <= old_size {
        unsafe { placement::crop(chunk, rounded) };
        return Ok(Outcome::Done(ptr));
      }

      let delta = rounded - old_size;
      let next = unsafe { (*chunk).next };
      let next_is_roomy_and_free = unsafe { (*next).free && (*next).size + Chunk::HEADER_SIZE >= delta };
      if next_is_roomy_and_free {
        unsafe {
          placement::absorb_next_for_growth(chunk);
          placement::crop(chunk, rounded);
        }
        return Ok(Outcome::Done(ptr));
      }

      Ok(Outcome::Relocate { old_size })
    })?;

    match outcome {
      Outcome::Done(p) => Ok(p),
      Outcome::Relocate { old_size } => {
        let new_ptr = self.allocate(rounded)?;
        unsafe {
          ptr::copy_nonoverlapping(ptr, new_ptr, old_size.min(rounded));
          self.release(ptr);
        }
        Ok(new_ptr)
      }
    }
  }

  /// Returns the chunk's post-rounding payload capacity (§4.5, §6
  /// `usable-size`).
  ///
  /// # Safety
  ///
  /// `ptr` must be a live pointer previously returned by this heap.
  pub(crate) unsafe fn usable_size(&self, ptr: *mut u8) -> usize {
    if ptr.is_null() {
      return 0;
    }
    self.with_state(|_state| {
      let chunk = unsafe { Chunk::from_payload(ptr) };
      Ok(unsafe { (*chunk).size })
    })
    .unwrap_or(0)
  }
}

/// Rounds a requested size up to the 16-byte quantum (§4.3.1).
///
/// A request for zero bytes is resolved, per §6's "implementation-defined
/// but must be stable within a run", to the minimum chunk size rather than
/// to `None` — every call returns a distinct pointer, which is the simpler
/// contract for callers that immediately index into the result.
fn round_size(size: usize) -> Result<usize, HeapError> {
  let rounded = align_up(size, ALIGN_QUANTUM).max(ALIGN_QUANTUM);
  if rounded > isize::MAX as usize {
    return Err(HeapError::CapacityExceeded);
  }
  Ok(rounded)
}

/// Lazily carves the initial arena out of the process break (§4.2).
fn ensure_initialized(state: &mut HeapState) -> Result<(), HeapError> {
  if state.initialized {
    return Ok(());
  }

  let page_size = brk::page_size();
  let region = INITIAL_PAGES * page_size;

  // Defensive: align the base up to the quantum in case something already
  // nudged the break before this library took over. In the ordinary
  // LD_PRELOAD deployment the break starts page-aligned and this is a
  // no-op; see DESIGN.md.
  let raw_base = unsafe { brk::current_break() };
  let base = align_up(raw_base as usize, ALIGN_QUANTUM) as *mut u8;
  let padding = base as usize - raw_base as usize;
  if padding > 0 {
    unsafe { brk::extend_break(padding)? };
  }

  let base = unsafe { brk::extend_break(region)? };
  let head = base as *mut Chunk;
  let tail = unsafe { base.add(region - Chunk::HEADER_SIZE) as *mut Chunk };

  unsafe {
    (*head).size = region - 2 * Chunk::HEADER_SIZE;
    (*head).free = true;
    (*head).prev = ptr::null_mut();
    (*head).next = tail;

    (*tail).size = 0;
    (*tail).free = false;
    (*tail).prev = head;
    (*tail).next = ptr::null_mut();
  }

  state.head = head;
  state.tail = tail;
  state.page_size = page_size;
  state.initialized = true;
  Ok(())
}

/// Allocation path for alignments at or below the quantum: every chunk
/// payload is already quantum-aligned by invariant, so a plain best-fit
/// search (extending on a miss) suffices.
fn allocate_quantum_aligned(state: &mut HeapState, size: usize) -> Result<*mut u8, HeapError> {
  let candidate = match placement::find_best_fit(state.head, state.tail, size, ALIGN_QUANTUM) {
    Some(c) => c,
    None => {
      let (chunk, new_tail) = unsafe { placement::extend(state.tail, state.page_size, size)? };
      state.tail = new_tail;
      chunk
    }
  };
  unsafe {
    placement::crop(candidate, size);
    (*candidate).free = false;
    Ok(Chunk::payload(candidate))
  }
}

/// Allocation path for alignments above the quantum (§4.3.2's note, and the
/// aligned-allocate law in §8): searches for a chunk containing an address
/// whose *payload* (not header) would satisfy `align`, front-crops down to
/// it via [`placement::front_crop_size`] if needed, then crops the tail as
/// usual.
///
/// Extending on a miss requests `size + align` extra bytes, plus one header
/// of slack for the front-crop split itself, so the freshly grown chunk is
/// guaranteed to contain an aligned payload address with `size` bytes free
/// after it, regardless of where the new memory happens to fall.
fn allocate_wide_aligned(state: &mut HeapState, size: usize, align: usize) -> Result<*mut u8, HeapError> {
  let candidate = match placement::find_aligned_fit(state.head, state.tail, size, align) {
    Some(c) => c,
    None => {
      let (chunk, new_tail) = unsafe { placement::extend(state.tail, state.page_size, size + align + Chunk::HEADER_SIZE)? };
      state.tail = new_tail;
      chunk
    }
  };

  let payload = unsafe { Chunk::payload(candidate) } as usize;
  let front = placement::front_crop_size(payload, align);

  let target = if front == 0 {
    candidate
  } else {
    unsafe {
      placement::crop(candidate, front);
      (*candidate).next
    }
  };

  unsafe {
    placement::crop(target, size);
    (*target).free = false;
    Ok(Chunk::payload(target))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;

  /// `HEAP` is the one process-wide arena, shared by every test in this
  /// binary; these tests lock `SERIAL` for their whole body so that chunk-
  /// count and adjacency assertions aren't perturbed by another test
  /// thread allocating concurrently. Per §6d this is real `sbrk` against
  /// the live process heap, not a mock program-break layer.
  static SERIAL: Mutex<()> = Mutex::new(());

  fn chunk_count() -> usize {
    HEAP.with_state(|state| {
      let mut n = 0usize;
      let mut cur = state.head;
      loop {
        n += 1;
        if cur == state.tail {
          break;
        }
        cur = unsafe { (*cur).next };
      }
      Ok(n)
    })
    .unwrap()
  }

  fn assert_invariants() {
    HEAP.with_state(|state| {
      #[cfg(debug_assertions)]
      placement::debug_assert_invariants(state.head, state.tail);
      #[cfg(not(debug_assertions))]
      let _ = state;
      Ok(())
    })
    .unwrap();
  }

  #[test]
  fn release_round_trip_restores_chunk_count() {
    let _guard = SERIAL.lock().unwrap();
    let before = chunk_count();
    let p = HEAP.allocate(256).unwrap();
    unsafe { HEAP.release(p) };
    assert_invariants();
    assert_eq!(chunk_count(), before);
  }

  #[test]
  fn best_fit_prefers_the_earlier_of_two_equal_holes() {
    let _guard = SERIAL.lock().unwrap();
    let a = HEAP.allocate(64).unwrap();
    let b = HEAP.allocate(128).unwrap();
    let c = HEAP.allocate(64).unwrap();
    unsafe {
      HEAP.release(a);
      HEAP.release(c);
    }
    let d = HEAP.allocate(48).unwrap();
    assert_eq!(d, a, "a request fitting two equal-sized holes reuses the earlier address");
    unsafe {
      HEAP.release(b);
      HEAP.release(d);
    }
    assert_invariants();
  }

  #[test]
  fn reallocate_to_its_own_usable_size_is_a_no_op() {
    let _guard = SERIAL.lock().unwrap();
    let p = HEAP.allocate(40).unwrap();
    let usable = unsafe { HEAP.usable_size(p) };
    let p2 = unsafe { HEAP.reallocate(p, usable).unwrap() };
    assert_eq!(p, p2);
    unsafe { HEAP.release(p2) };
    assert_invariants();
  }

  #[test]
  fn reallocate_zero_releases_and_returns_null() {
    let _guard = SERIAL.lock().unwrap();
    let p = HEAP.allocate(40).unwrap();
    let before = chunk_count();
    let result = unsafe { HEAP.reallocate(p, 0).unwrap() };
    assert!(result.is_null());
    assert_eq!(chunk_count(), before);
    assert_invariants();
  }

  #[test]
  fn grow_in_place_absorbs_a_free_right_neighbor() {
    let _guard = SERIAL.lock().unwrap();
    let first = HEAP.allocate(32).unwrap();
    let second = HEAP.allocate(32).unwrap();
    unsafe { HEAP.release(second) };
    let grown = unsafe { HEAP.reallocate(first, 80).unwrap() };
    assert_eq!(grown, first, "growing into a free right neighbor must not relocate");
    unsafe { HEAP.release(grown) };
    assert_invariants();
  }

  #[test]
  fn grow_with_relocation_preserves_contents() {
    let _guard = SERIAL.lock().unwrap();
    let first = HEAP.allocate(32).unwrap();
    unsafe { std::ptr::write_bytes(first, 0xAB, 32) };
    // A same-sized allocation right after `first` is, absent a smaller
    // free hole elsewhere, placed in the chunk immediately following it
    // — blocking the in-place grow path below.
    let blocker = HEAP.allocate(32).unwrap();
    let grown = unsafe { HEAP.reallocate(first, 1 << 16).unwrap() };
    assert_ne!(grown, first, "growing past a live neighbor must relocate");
    let preserved = unsafe { std::slice::from_raw_parts(grown, 32) };
    assert!(preserved.iter().all(|&b| b == 0xAB));
    unsafe {
      HEAP.release(grown);
      HEAP.release(blocker);
    }
    assert_invariants();
  }

  #[test]
  fn aligned_allocation_honors_the_requested_power_of_two() {
    let _guard = SERIAL.lock().unwrap();
    let p = HEAP.allocate_aligned(4096, 100).unwrap();
    assert_eq!(p as usize % 4096, 0);
    assert_eq!(unsafe { HEAP.usable_size(p) }, 112);
    unsafe { HEAP.release(p) };
    assert_invariants();
  }

  #[test]
  fn aligned_allocation_rejects_non_power_of_two() {
    let _guard = SERIAL.lock().unwrap();
    assert_eq!(HEAP.allocate_aligned(24, 64), Err(HeapError::InvalidArgument));
  }

  #[test]
  fn extension_on_exhaustion_advances_the_program_break() {
    let _guard = SERIAL.lock().unwrap();
    let before = unsafe { brk::current_break() };
    let mut pointers = Vec::new();
    for _ in 0..5000 {
      pointers.push(HEAP.allocate(4096).unwrap());
    }
    let after = unsafe { brk::current_break() };
    assert!(after as usize > before as usize, "allocating past the initial arena must grow the break");
    for p in pointers {
      unsafe { HEAP.release(p) };
    }
    assert_invariants();
  }
}
