/// Saved registers for kernel context switches.
///
/// The switch primitive saves and restores only the callee-saved set:
/// the return address and stack pointer carry the control transfer, and
/// caller-saved registers are already on the stack of whoever called
/// into the switch.
#[repr(C)]
#[derive(Copy, Clone, Default)]
pub struct Context {
    pub ra: usize,
    pub sp: usize,

    // callee-saved
    pub s0: usize,
    pub s1: usize,
    pub s2: usize,
    pub s3: usize,
    pub s4: usize,
    pub s5: usize,
    pub s6: usize,
    pub s7: usize,
    pub s8: usize,
    pub s9: usize,
    pub s10: usize,
    pub s11: usize,
}

impl Context {
    pub const fn new() -> Context {
        Context {
            ra: 0,
            sp: 0,
            s0: 0,
            s1: 0,
            s2: 0,
            s3: 0,
            s4: 0,
            s5: 0,
            s6: 0,
            s7: 0,
            s8: 0,
            s9: 0,
            s10: 0,
            s11: 0,
        }
    }

    /// Context for a process that has never run: the first switch into
    /// it "returns" to the fork trampoline on a fresh kernel stack.
    pub fn first_return(forkret: usize, stack_top: usize) -> Context {
        Context {
            ra: forkret,
            sp: stack_top,
            ..Context::new()
        }
    }
}
