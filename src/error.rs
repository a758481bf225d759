//! Internal error vocabulary for the core (§6a).
//!
//! The façade in [`crate::ffi`] is the only place that translates this type
//! into a POSIX convention (null + `errno`, or a status code). Nothing below
//! the façade panics on these — `Unsupported` is the one variant the façade
//! treats as fatal, per §7.

/// The three failure kinds recognized by the core, matching §7 exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeapError {
  /// Arena cannot be grown, or the rounded size does not fit in `isize`.
  CapacityExceeded,
  /// Bad alignment: zero, or not a power of two.
  InvalidArgument,
  /// Alignment exceeds the page size. The façade turns this into a fatal
  /// abort rather than ever returning it to a caller.
  Unsupported,
}
