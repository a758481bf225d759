//! # brkheap - A single-arena, boundary-tagged heap manager
//!
//! This crate is a drop-in replacement for the process heap allocator,
//! meant to be preloaded ahead of the system allocator (`LD_PRELOAD`) so
//! that every dynamically resolved `malloc`/`free`/`realloc` call in a
//! target program binds here instead. Unlike a bump allocator, freed memory
//! is tracked and reused: every allocation and every hole is a *chunk*
//! threaded into one doubly linked list running through a single
//! `sbrk`-grown arena, with eager coalescing on free.
//!
//! ## Overview
//!
//! ```text
//!   Chunk store (ascending address order):
//!
//!   head                                                           tail
//!    │                                                               │
//!    ▼                                                               ▼
//!   ┌─────────┬──────────┬─────────┬──────────┬─────────┬──────────┬──────┐
//!   │ size:64 │  size:32 │size:128 │ size: N  │  ...    │ size: M  │ 0,•──┼──► program
//!   │ alloc   │  free    │ alloc   │  free    │         │  free    │ break
//!   └────┬────┴────┬─────┴────┬────┴────┬─────┴─────────┴────┬─────┴──────┘
//!        │◄─next───┤◄──next───┤◄──next──┤                    │
//!        ├──prev──►│          │         │                    │
//!
//!   Best-fit search scans head→tail for the smallest free chunk that is
//!   large enough and correctly aligned. A miss triggers extension: the
//!   tail sentinel is rewritten into a fresh free chunk and a new,
//!   zero-size tail is installed past it.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   brkheap
//!   ├── config     - compile-time tunables (INITIAL_PAGES, quantum, ...)
//!   ├── align      - alignment rounding shared by every module below
//!   ├── brk        - the only module that calls sbrk/sysconf directly
//!   ├── chunk      - the chunk header and its pointer arithmetic
//!   ├── placement  - best-fit search, crop, coalesce, extend
//!   ├── heap       - process-wide state, the mutex, lazy init
//!   ├── error      - the internal HeapError vocabulary
//!   ├── fatal      - allocation-free diagnostic + abort paths
//!   └── ffi        - the extern "C" façade (malloc, free, realloc, ...)
//! ```
//!
//! ## Deployment
//!
//! Build as a `cdylib` and preload it:
//!
//! ```text
//! $ cargo build --release
//! $ LD_PRELOAD=./target/release/libbrkheap.so your_program
//! ```
//!
//! ## Limitations
//!
//! - **Single arena**: no per-thread caches, no size classes, no mmap'd
//!   large-allocation path. One contiguous region, grown only by `sbrk`.
//! - **Never shrinks**: the arena is never returned to the OS.
//! - **No hardening**: no canaries, no guard pages, no double-free
//!   detection. Misuse is undefined behavior, as with any C allocator.
//! - **Non-recursive mutex**: calling into this allocator from a signal
//!   handler while already inside it is undefined behavior.
//!
//! ## Safety
//!
//! Every entry point in [`ffi`] is `extern "C"` and trusts its caller to
//! follow the usual C allocator contract. The safe-looking `Heap` methods
//! underneath are `pub(crate)` precisely because they still trust the same
//! contract (a pointer came from this heap, wasn't already freed); they are
//! not a safe abstraction over raw memory, just the boundary where raw
//! pointer arithmetic stops and gets organized into chunks.

mod align;
mod brk;
mod chunk;
mod config;
mod error;
mod fatal;
mod ffi;
mod heap;
mod placement;
