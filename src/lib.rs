//! # fiballoc - A Fibonacci Buddy Allocator
//!
//! This crate manages one pre-reserved arena with a **buddy allocator** whose
//! block sizes follow the Fibonacci sequence instead of powers of two.
//!
//! ## Overview
//!
//! The arena is a whole Fibonacci number of *basic blocks*. A block of
//! `F(k)` basic blocks splits into two buddies of `F(k-1)` and `F(k-2)`,
//! which is why the sizes stay Fibonacci numbers all the way down:
//!
//! ```text
//!   Split tree of a 13-block arena:
//!
//!                     ┌──────────────── 13 ────────────────┐
//!                     │               root                 │
//!                     └────────────────────────────────────┘
//!                      ┌──────── 8 ─────────┬───── 5 ──────┐
//!                      │        L           │      R       │
//!                      └────────────────────┴──────────────┘
//!                      ┌──── 5 ────┬── 3 ──┬─── 3 ──┬─ 2 ─┐
//!                      │    L      │   R   │   L    │  R  │
//!                      └───────────┴───────┴────────┴─────┘
//! ```
//!
//! Compared to binary buddies, the sizes grow by ~1.618x per class rather
//! than 2x, so rounding a request up wastes less memory.
//!
//! ## Crate Structure
//!
//! ```text
//!   fiballoc
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── fib        - Fibonacci index arithmetic
//!   ├── block      - Block header placed in front of every block
//!   ├── arena      - The mmap'd region backing everything
//!   ├── free_list  - One list per Fibonacci index, plus the allocation queue
//!   ├── split      - Split engine
//!   ├── coalesce   - Coalesce engine
//!   ├── heap       - Allocate/release paths over one arena
//!   ├── allocator  - FibonacciAllocator (init / teardown lifecycle)
//!   ├── dump       - Free-list snapshots for diagnostics
//!   ├── config     - AllocatorConfig
//!   └── error      - AllocError
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use fiballoc::FibonacciAllocator;
//!
//! let mut allocator = FibonacciAllocator::new();
//! let arena_size = allocator.init(32, 95000).unwrap();
//! assert_eq!(arena_size, 4181 * 32);
//!
//! let address = allocator.allocate(45).unwrap();
//! unsafe { address.as_ptr().write_bytes(0, 45) };
//!
//! allocator.release(address.as_ptr()).unwrap();
//! println!("{}", allocator.dump_free_lists().unwrap());
//!
//! allocator.teardown().unwrap();
//! ```
//!
//! ## How It Works
//!
//! Every block starts with a header. Handed-out addresses point just past it:
//!
//! ```text
//!   One block of F(k) basic blocks:
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Block Header       │         User Data              │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ tag             │  │                                │
//!   │  │ block_count     │  │                                │
//!   │  │ free            │  │                                │
//!   │  │ side            │  │                                │
//!   │  │ inherited_side  │  │                                │
//!   │  │ prev / next     │  │                                │
//!   │  └─────────────────┘  │                                │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Pointer returned to user
//! ```
//!
//! Free blocks are kept in the list of their Fibonacci index. An allocation
//! takes the smallest non-empty list that fits, splitting a larger block down
//! when needed. A release puts the block back and merges it with its buddy
//! for as long as the buddy is free, found purely through address arithmetic
//! and the `side`/`inherited_side` pair in each header.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **Fixed arena**: The arena never grows after `init`
//! - **Unix-only**: Requires `libc` and `mmap` (POSIX systems)

pub mod align;
mod allocator;
mod arena;
mod block;
mod coalesce;
pub mod config;
pub mod dump;
pub mod error;
pub mod fib;
mod free_list;
mod heap;
mod split;

pub use allocator::FibonacciAllocator;
pub use block::{HEADER_SIZE, Side};
pub use config::AllocatorConfig;
pub use dump::{BlockSummary, BucketDump, FreeListDump};
pub use error::AllocError;
