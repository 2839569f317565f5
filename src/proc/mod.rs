pub mod context;
pub mod cpu;
pub mod process;
pub mod scheduler;
pub mod trapframe;

pub use context::Context;
pub use cpu::Cpu;
pub use process::{Chan, Proc, ProcError, ProcId, ProcState};
pub use trapframe::TrapFrame;
