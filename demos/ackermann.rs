use std::time::Instant;

use clap::Parser;
use fiballoc::{AllocError, FibonacciAllocator};
use tracing_subscriber::EnvFilter;

/// Runs the (highly recursive!) Ackermann function, allocating and releasing
/// a block of memory in every recursion step.
#[derive(Parser, Debug)]
#[command(about = "Ackermann function over the Fibonacci buddy allocator")]
struct Args {
  /// First Ackermann argument.
  n: u64,

  /// Second Ackermann argument.
  m: u64,

  /// Basic block size in bytes.
  #[arg(long, default_value_t = 256)]
  block_size: usize,

  /// Requested arena length in bytes.
  #[arg(long, default_value_t = 1 << 20)]
  arena_bytes: usize,
}

struct Counters {
  allocations: u64,
  failures: u64,
}

/// Sizes cycle through small and medium requests so every bucket sees use.
fn request_size(depth: u64) -> usize {
  const SIZES: [usize; 6] = [1, 17, 100, 250, 700, 1500];
  SIZES[(depth % SIZES.len() as u64) as usize]
}

fn ackermann(
  allocator: &mut FibonacciAllocator,
  counters: &mut Counters,
  n: u64,
  m: u64,
  depth: u64,
) -> Result<u64, AllocError> {
  let length = request_size(depth);

  let block = match allocator.allocate(length) {
    Ok(block) => {
      counters.allocations += 1;
      unsafe { block.as_ptr().write_bytes((depth & 0xff) as u8, length) };
      Some(block)
    }
    Err(AllocError::Exhaustion { .. }) => {
      counters.failures += 1;
      None
    }
    Err(error) => return Err(error),
  };

  let result = if n == 0 {
    m + 1
  } else if m == 0 {
    ackermann(allocator, counters, n - 1, 1, depth + 1)?
  } else {
    let inner = ackermann(allocator, counters, n, m - 1, depth + 1)?;
    ackermann(allocator, counters, n - 1, inner, depth + 1)?
  };

  if let Some(block) = block {
    let intact = (0..length).all(|i| unsafe { *block.as_ptr().add(i) } == (depth & 0xff) as u8);

    if !intact {
      tracing::error!(depth, length, "block contents were overwritten");
    }

    allocator.release(block.as_ptr())?;
  }

  Ok(result)
}

fn main() -> Result<(), AllocError> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .init();

  let args = Args::parse();

  let mut allocator = FibonacciAllocator::new();
  allocator.init(args.block_size, args.arena_bytes)?;

  let mut counters = Counters {
    allocations: 0,
    failures: 0,
  };

  let started = Instant::now();
  let result = ackermann(&mut allocator, &mut counters, args.n, args.m, 0)?;

  println!("ackermann({}, {}) = {}", args.n, args.m, result);
  println!(
    "{} allocations, {} refused for lack of memory, {:?}",
    counters.allocations,
    counters.failures,
    started.elapsed()
  );

  let dump = allocator.dump_free_lists()?;
  println!("free blocks after the run: {} of {}", dump.free_blocks(), dump.total_blocks);

  allocator.teardown()
}
