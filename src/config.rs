//! Compile-time tunables named in the arena's growth policy.
//!
//! Kept in one place rather than scattered as magic numbers through
//! `placement.rs` and `heap.rs`, per §9's note on process-wide state: the page
//! size itself is *not* here because it is a runtime fact discovered once
//! during lazy initialization (see [`crate::heap`]), not a build-time
//! constant.

/// Every chunk payload, and every chunk `size`, is a multiple of this.
pub(crate) const ALIGN_QUANTUM: usize = 16;

/// Initial arena size, in whole pages, carved out on first use.
pub(crate) const INITIAL_PAGES: usize = 256;

/// Minimum growth, in whole pages, for any single extension.
pub(crate) const EXTEND_MIN_PAGES: usize = 16;
