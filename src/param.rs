use static_assertions::const_assert;

/// Maximum number of processes
pub const NPROC: usize = 64;
/// Maximum number of CPUs
pub const NCPU: usize = 8;
/// Maximum number of open files per process
pub const NOFILE: usize = 16;
/// Size of a kernel stack page
pub const KSTACKSIZE: usize = 4096;
/// Size of a user page
pub const PGSIZE: usize = 4096;
/// Floor on a scheduling slice, in timer ticks
pub const MIN_GRAN: u64 = 2;
/// Largest meaningful niceness; higher values clamp here
pub const NICE_LIMIT: u32 = 30;
/// Scheduling weight of a process with niceness zero
pub const NICE_ZERO_WEIGHT: u64 = 1024;

// The period arithmetic divides by MIN_GRAN and the default latency
// is half the pool size, so neither may degenerate to zero.
const_assert!(NPROC >= 2);
const_assert!(MIN_GRAN >= 1);
const_assert!(NPROC / 2 >= MIN_GRAN as usize);
