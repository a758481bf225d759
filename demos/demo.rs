use std::ffi::c_void;
use std::io::Read;
use std::ptr;

use libc::{sbrk, size_t};

// These resolve to brkheap's own `#[no_mangle] extern "C"` entry points
// (src/ffi.rs) rather than the system allocator's, since this binary links
// brkheap in directly. The real deployment is `LD_PRELOAD`, not this
// direct link, but linking it in lets the demo exercise the same ABI
// without needing a second process.
unsafe extern "C" {
  fn malloc(size: size_t) -> *mut c_void;
  fn free(ptr: *mut c_void);
  fn realloc(ptr: *mut c_void, size: size_t) -> *mut c_void;
  fn malloc_usable_size(ptr: *mut c_void) -> size_t;
  fn aligned_alloc(align: size_t, size: size_t) -> *mut c_void;
}

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
unsafe fn print_program_break(label: &str) {
  println!("[{}] PID = {}, program break (sbrk(0)) = {:?}", label, std::process::id(), unsafe { sbrk(0) });
}

/// Debug helper mirroring the allocation, its address, and the usable size
/// the chunk actually carries (which may be larger than requested).
unsafe fn print_alloc(label: &str, requested: usize, addr: *mut c_void) {
  let usable = unsafe { malloc_usable_size(addr) };
  println!("[{label}] requested {requested} bytes, address = {addr:?}, usable size = {usable}");
}

fn main() {
  unsafe {
    print_program_break("start");
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 1) Allocate 4 bytes, write through it.
    // ------------------------------------------------------------------
    let first_block = malloc(4);
    println!("\n[1] Allocate 4 bytes");
    print_alloc("1", 4, first_block);
    let first_ptr = first_block as *mut u32;
    first_ptr.write(0xDEADBEEF);
    println!("[1] Value written to first_block = 0x{:X}", first_ptr.read());
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 2) Allocate 12 bytes.
    // ------------------------------------------------------------------
    let second_block = malloc(12);
    println!("\n[2] Allocate 12 bytes");
    print_alloc("2", 12, second_block);
    ptr::write_bytes(second_block as *mut u8, 0xAB, 12);
    println!("[2] Initialized second block with 0xAB");
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 3) Release the first block, then allocate a smaller one to show
    //    that the hole gets reused instead of growing the heap.
    // ------------------------------------------------------------------
    free(first_block);
    println!("\n[3] Released first_block at {:?}", first_block);
    let third_block = malloc(2);
    println!("[3] Allocate 2 bytes");
    print_alloc("3", 2, third_block);
    println!(
      "[3] third_block == first_block? {}",
      if third_block == first_block { "yes, the hole was reused" } else { "no, allocated elsewhere" }
    );
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 4) Grow-with-relocation: realloc to something much bigger than
    //    what fits in place.
    // ------------------------------------------------------------------
    print_program_break("before grow realloc");
    let grown = realloc(second_block, 64 * 1024);
    println!("\n[4] realloc(second_block, 64 KiB)");
    print_alloc("4", 64 * 1024, grown);
    println!("[4] grown == second_block? {}", grown == second_block);
    print_program_break("after grow realloc");
    block_until_enter_pressed();

    // ------------------------------------------------------------------
    // 5) Page-aligned allocation.
    // ------------------------------------------------------------------
    let page = libc::sysconf(libc::_SC_PAGESIZE) as usize;
    let aligned = aligned_alloc(page, 100);
    println!("\n[5] aligned_alloc({page}, 100)");
    print_alloc("5", 100, aligned);
    println!("[5] address % page_size == {}", (aligned as usize) % page);
    block_until_enter_pressed();

    free(third_block);
    free(grown);
    free(aligned);
    println!("\n[6] End of demo. Process will exit and the OS will reclaim all memory.");
  }
}
