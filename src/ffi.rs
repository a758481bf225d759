//! The external façade (§6): the conventional `extern "C"` allocator entry
//! points a dynamic linker binds a preloaded shared object to. Every
//! function here is a thin translation from [`HeapError`] to the POSIX
//! convention for that entry point — null + `errno`, or a status code — and
//! nothing here holds the heap's mutex across a call into another façade
//! function, since [`Heap`] itself already structures `reallocate` that way.

use std::ffi::c_void;

use libc::{c_int, size_t, EINVAL, ENOMEM};

use crate::error::HeapError;
use crate::fatal;
use crate::heap::HEAP;

#[inline]
fn set_errno(value: c_int) {
  unsafe { *libc::__errno_location() = value };
}

#[inline]
fn translate_error(err: HeapError, align: usize) -> c_int {
  match err {
    HeapError::CapacityExceeded => ENOMEM,
    HeapError::InvalidArgument => EINVAL,
    HeapError::Unsupported => fatal::unsupported_alignment(align),
  }
}

/// POSIX `malloc` — allocates `size` bytes of uninitialized memory, 16-byte
/// aligned.
///
/// # Safety
///
/// Caller must eventually `free` the returned pointer exactly once (or pass
/// it to `realloc`, which consumes it).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn malloc(size: size_t) -> *mut c_void {
  match HEAP.allocate(size) {
    Ok(ptr) => ptr.cast(),
    Err(err) => {
      set_errno(translate_error(err, 0));
      std::ptr::null_mut()
    }
  }
}

/// POSIX `free` — deallocates memory previously returned by `malloc`,
/// `calloc`, `realloc`, or `aligned_alloc`. A null `ptr` is a no-op.
///
/// # Safety
///
/// `ptr` must be null or a pointer previously returned by one of this
/// crate's allocation functions, not already freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
  unsafe { HEAP.release(ptr.cast()) };
}

/// POSIX `calloc` — allocates zero-initialized memory for `nmemb` elements
/// of `size` bytes each. Returns null if `nmemb * size` overflows.
///
/// # Safety
///
/// Caller must eventually `free` the returned pointer exactly once.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn calloc(nmemb: size_t, size: size_t) -> *mut c_void {
  let total = match nmemb.checked_mul(size) {
    Some(t) => t,
    None => {
      set_errno(ENOMEM);
      return std::ptr::null_mut();
    }
  };
  match HEAP.allocate(total) {
    Ok(ptr) => {
      unsafe { std::ptr::write_bytes(ptr, 0, total) };
      ptr.cast()
    }
    Err(err) => {
      set_errno(translate_error(err, 0));
      std::ptr::null_mut()
    }
  }
}

/// POSIX `realloc` — resizes the allocation at `ptr` to `size` bytes,
/// per §4.4. `ptr == NULL` behaves like `malloc`; `size == 0` behaves like
/// `free` and returns `NULL`. Contents up to `min(old, new)` are preserved.
///
/// # Safety
///
/// `ptr` must be null or a pointer previously returned by one of this
/// crate's allocation functions, not already freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn realloc(ptr: *mut c_void, size: size_t) -> *mut c_void {
  match unsafe { HEAP.reallocate(ptr.cast(), size) } {
    Ok(new_ptr) => new_ptr.cast(),
    Err(err) => {
      set_errno(translate_error(err, 0));
      std::ptr::null_mut()
    }
  }
}

/// GNU/BSD `reallocarray` — as `realloc` for `nmemb * size` bytes; returns
/// null without touching `ptr` if the multiplication overflows.
///
/// # Safety
///
/// Same contract as [`realloc`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn reallocarray(ptr: *mut c_void, nmemb: size_t, size: size_t) -> *mut c_void {
  let total = match nmemb.checked_mul(size) {
    Some(t) => t,
    None => {
      set_errno(ENOMEM);
      return std::ptr::null_mut();
    }
  };
  match unsafe { HEAP.reallocate(ptr.cast(), total) } {
    Ok(new_ptr) => new_ptr.cast(),
    Err(err) => {
      set_errno(translate_error(err, 0));
      std::ptr::null_mut()
    }
  }
}

/// glibc `malloc_usable_size` — the chunk's post-rounding payload capacity
/// (§4.5), which may exceed the original request by up to 15 bytes.
///
/// # Safety
///
/// `ptr` must be a live pointer previously returned by one of this crate's
/// allocation functions.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn malloc_usable_size(ptr: *mut c_void) -> size_t {
  unsafe { HEAP.usable_size(ptr.cast()) }
}

/// C11 `aligned_alloc` — allocates `size` bytes aligned to `align`, which
/// must be a power of two no greater than the page size.
///
/// # Safety
///
/// Caller must eventually `free` the returned pointer exactly once.
///
/// # Aborts
///
/// Terminates the process if `align` exceeds the page size (§7
/// `unsupported`) — a silent fallback here would produce memory the caller
/// believes is more aligned than it is.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aligned_alloc(align: size_t, size: size_t) -> *mut c_void {
  match HEAP.allocate_aligned(align, size) {
    Ok(ptr) => ptr.cast(),
    Err(err) => {
      set_errno(translate_error(err, align));
      std::ptr::null_mut()
    }
  }
}

/// POSIX `posix_memalign` — as `aligned_alloc`, but reports failure through
/// a status code instead of `errno`, and never aborts: a bad `align` is
/// reported as `EINVAL`, per POSIX, rather than treated as the fatal
/// "exceeds the page size" case `aligned_alloc`/`malloc` escalate to.
///
/// # Safety
///
/// `memptr` must point to a valid, writable `*mut c_void`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn posix_memalign(memptr: *mut *mut c_void, align: size_t, size: size_t) -> c_int {
  if align == 0 || !align.is_power_of_two() || align % std::mem::size_of::<usize>() != 0 {
    return EINVAL;
  }
  match HEAP.allocate_aligned(align, size) {
    Ok(ptr) => {
      unsafe { *memptr = ptr.cast() };
      0
    }
    Err(HeapError::Unsupported) => EINVAL,
    Err(_) => ENOMEM,
  }
}
