#![cfg_attr(not(test), no_std)]

//! Process scheduling core for a small multiprocessor kernel.
//!
//! A completely-fair runqueue over a red-black tree keyed by virtual
//! runtime, a fixed pool of process descriptors, and the lifecycle
//! operations (fork, exit, wait, sleep, wakeup, kill, yield) that keep
//! tree membership consistent with runnability across CPUs. Platform
//! concerns live behind [`hal::Hal`]; everything else is here.

pub mod console;
pub mod hal;
pub mod kernel;
pub mod param;
pub mod proc;
pub mod runqueue;
pub mod sync;

pub use kernel::Kernel;
pub use proc::{Chan, Context, Cpu, Proc, ProcError, ProcId, ProcState, TrapFrame};
pub use runqueue::{calculate_weight, check_preemption, Color, RbNode, RunQueue};
pub use sync::Spinlock;
