//! Fatal diagnostic paths (§5, §7, §9).
//!
//! This allocator may be installed as *the* process allocator, so anything
//! reachable from a fatal path must not itself allocate. No `format!`, no
//! `println!`, no `String` — just fixed-size stack buffers and a direct
//! `write(2)` to stderr, followed by `abort()`. No recovery is attempted.

use libc::STDERR_FILENO;

/// Writes `msg` to stderr with a direct syscall, ignoring short writes —
/// there is no recovery path to retry from here.
fn write_stderr(msg: &[u8]) {
  unsafe {
    libc::write(STDERR_FILENO, msg.as_ptr() as *const libc::c_void, msg.len());
  }
}

/// Formats `value` as lowercase hex into a fixed stack buffer and writes it,
/// prefixed with `0x`. No heap allocation.
fn write_hex(value: usize) {
  const DIGITS: &[u8; 16] = b"0123456789abcdef";
  let mut buf = [0u8; 2 + mem_size_of_usize_hex_digits()];
  buf[0] = b'0';
  buf[1] = b'x';
  let mut v = value;
  let mut i = buf.len();
  loop {
    i -= 1;
    buf[i] = DIGITS[(v & 0xf) as usize];
    v >>= 4;
    if i == 2 {
      break;
    }
  }
  write_stderr(&buf);
}

const fn mem_size_of_usize_hex_digits() -> usize {
  std::mem::size_of::<usize>() * 2
}

/// Reports an invariant violation between two adjacent chunks and aborts.
///
/// Called only from `#[cfg(debug_assertions)]` paths in [`crate::placement`],
/// per §7: "Internal invariant breaches (detected only in debug builds)
/// abort the process with a diagnostic identifying the two adjacent chunks
/// that disagree."
pub(crate) fn invariant_violation(what: &'static str, a: usize, b: usize) -> ! {
  write_stderr(b"brkheap: invariant violation: ");
  write_stderr(what.as_bytes());
  write_stderr(b" (");
  write_hex(a);
  write_stderr(b", ");
  write_hex(b);
  write_stderr(b")\n");
  unsafe { libc::abort() }
}

/// Reports a request for an alignment greater than the page size and aborts.
///
/// §7 treats this as a fatal programmer error rather than a recoverable one:
/// "returning failure would encourage silent fallback that the system
/// cannot correctly execute."
pub(crate) fn unsupported_alignment(align: usize) -> ! {
  write_stderr(b"brkheap: unsupported alignment: ");
  write_hex(align);
  write_stderr(b" exceeds the page size\n");
  unsafe { libc::abort() }
}
