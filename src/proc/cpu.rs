use super::{context::Context, process::ProcId};

/// Per-CPU state.
pub struct Cpu {
    /// The process running on this cpu, or none.
    pub proc: Option<ProcId>,
    /// swtch() here to enter the scheduler loop.
    pub scheduler: Context,
    /// Depth of push_off() nesting.
    pub noff: i32,
    /// Were interrupts enabled before push_off()?
    pub intena: bool,
}

impl Cpu {
    pub const fn new() -> Cpu {
        Cpu {
            proc: None,
            scheduler: Context::new(),
            noff: 0,
            intena: false,
        }
    }
}

impl Default for Cpu {
    fn default() -> Cpu {
        Cpu::new()
    }
}
