/// Per-process user register save area.
///
/// Filled by the trap entry path when a process enters the kernel and
/// drained by the return path. The layout belongs to the platform's
/// trap code; the scheduling core only seeds `epc` and `sp` for the
/// first user instruction and clears `a0` so a forked child sees a
/// zero return value.
#[repr(C)]
#[derive(Copy, Clone, Default)]
pub struct TrapFrame {
    /// saved user program counter
    pub epc: usize,
    pub ra: usize,
    pub sp: usize,
    pub gp: usize,
    pub tp: usize,
    pub t0: usize,
    pub t1: usize,
    pub t2: usize,
    pub s0: usize,
    pub s1: usize,
    /// syscall return value lives here
    pub a0: usize,
    pub a1: usize,
    pub a2: usize,
    pub a3: usize,
    pub a4: usize,
    pub a5: usize,
    pub a6: usize,
    pub a7: usize,
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
    pub t3: usize,
    pub t4: usize,
    pub t5: usize,
    pub t6: usize,
}

impl TrapFrame {
    /// Frame for the very first user process: program counter at the
    /// start of the embedded image, stack at the top of its one page.
    pub fn user_init(stack_top: usize) -> TrapFrame {
        TrapFrame {
            epc: 0,
            sp: stack_top,
            ..TrapFrame::default()
        }
    }
}
