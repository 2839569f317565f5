//! Process descriptors and the lifecycle operations that move them
//! between states. The fixed pool doubles as the allocator and the
//! sleep/wait index; a descriptor is in the runqueue exactly when its
//! state is Runnable.

use arrayvec::ArrayString;

use super::{Context, TrapFrame};
use crate::hal::{FileRef, Hal, InodeRef, KernelStack, PageDir};
use crate::kernel::Kernel;
use crate::param::{NICE_LIMIT, NOFILE, NPROC, PGSIZE};
use crate::runqueue::RbNode;
use crate::sync::Spinlock;
use crate::{kprint, kprintln};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProcState {
    Unused,
    Embryo,
    Sleeping,
    Runnable,
    Running,
    Zombie,
}

impl ProcState {
    /// Fixed-width names for the console listing.
    pub fn name(self) -> &'static str {
        match self {
            ProcState::Unused => "unused",
            ProcState::Embryo => "embryo",
            ProcState::Sleeping => "sleep ",
            ProcState::Runnable => "runble",
            ProcState::Running => "run   ",
            ProcState::Zombie => "zombie",
        }
    }
}

/// Slot index of a descriptor in the process table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProcId(pub(crate) usize);

impl ProcId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Opaque rendezvous address for sleep/wakeup.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Chan(pub usize);

impl Chan {
    /// The channel a process's parent waits on.
    pub(crate) fn proc(id: ProcId) -> Chan {
        Chan(id.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProcError {
    /// Every descriptor slot is taken.
    MaxProcesses,
    /// A page or address-space allocation failed.
    Allocation,
    /// wait() with nothing to reap, ever.
    NoChildren,
    /// wait() interrupted by kill().
    Killed,
    /// No live process has that pid.
    NotFound,
}

/// Per-process state.
pub struct Proc {
    // ptable.lock must be held when using these:
    /// Process state
    pub state: ProcState,
    /// Sleeping on this channel, if any
    pub chan: Option<Chan>,
    /// Has been killed; observed at the next trap boundary
    pub killed: bool,
    /// Process ID
    pub pid: i32,
    /// Parent process
    pub parent: Option<ProcId>,

    // These are private to the process, so ptable.lock need not be held:
    /// The page backing this process's kernel stack
    pub kstack: Option<KernelStack>,
    /// Size of process memory (bytes)
    pub sz: usize,
    /// User page directory
    pub pgdir: Option<PageDir>,
    /// User register save area
    pub tf: TrapFrame,
    /// swtch() here to run the process
    pub context: Context,
    /// Open files
    pub ofile: [Option<FileRef>; NOFILE],
    /// Current directory
    pub cwd: Option<InodeRef>,
    /// Process name (debugging)
    pub name: ArrayString<16>,

    // Scheduling state, committed under ptable.lock:
    /// Normalized execution time accumulated over the process's life
    pub virtual_runtime: u64,
    /// Ticks consumed in the current slice
    pub current_runtime: u64,
    /// Slice budget granted at the last extraction
    pub max_exec_time: u64,
    /// Niceness, 0 (greedy) through 30 (generous)
    pub nice: u32,
    /// Weight derived from niceness at queue time
    pub proc_weight: u64,

    /// Runqueue linkage, guarded by the runqueue lock
    pub node: RbNode,
}

impl Proc {
    pub(crate) fn new() -> Proc {
        Proc {
            state: ProcState::Unused,
            chan: None,
            killed: false,
            pid: 0,
            parent: None,
            kstack: None,
            sz: 0,
            pgdir: None,
            tf: TrapFrame::default(),
            context: Context::new(),
            ofile: core::array::from_fn(|_| None),
            cwd: None,
            name: ArrayString::new(),
            virtual_runtime: 0,
            current_runtime: 0,
            max_exec_time: 0,
            nice: 0,
            proc_weight: 0,
            node: RbNode::new(),
        }
    }
}

pub(crate) struct ProcTable {
    pub(crate) lock: Spinlock,
    pub(crate) procs: [Proc; NPROC],
    pub(crate) nextpid: i32,
    pub(crate) initproc: Option<ProcId>,
}

impl ProcTable {
    pub(crate) fn new() -> ProcTable {
        ProcTable {
            lock: Spinlock::new("ptable"),
            procs: core::array::from_fn(|_| Proc::new()),
            nextpid: 1,
            initproc: None,
        }
    }
}

/// Disjoint mutable references to two descriptors in the pool.
fn pair_mut(procs: &mut [Proc], a: usize, b: usize) -> (&mut Proc, &mut Proc) {
    debug_assert_ne!(a, b);
    if a < b {
        let (lo, hi) = procs.split_at_mut(b);
        (&mut lo[a], &mut hi[0])
    } else {
        let (lo, hi) = procs.split_at_mut(a);
        (&mut hi[0], &mut lo[b])
    }
}

impl<H: Hal> Kernel<H> {
    /// Claim an unused descriptor and set up everything it needs to
    /// run in the kernel: a fresh pid, a kernel stack, and a context
    /// that lands in forkret on first scheduling. Scheduling state
    /// starts from zero, so a new process is maximally entitled.
    pub(crate) fn allocproc(&mut self) -> Result<ProcId, ProcError> {
        self.acquire_ptable();
        let Some(slot) = self
            .ptable
            .procs
            .iter()
            .position(|p| p.state == ProcState::Unused)
        else {
            self.release_ptable();
            return Err(ProcError::MaxProcesses);
        };
        let pid = self.ptable.nextpid;
        self.ptable.nextpid += 1;
        {
            let p = &mut self.ptable.procs[slot];
            p.state = ProcState::Embryo;
            p.pid = pid;
        }
        self.release_ptable();

        // Allocate kernel stack.
        let Some(kstack) = self.hal.kalloc() else {
            self.ptable.procs[slot].state = ProcState::Unused;
            return Err(ProcError::Allocation);
        };

        // First switch into this process "returns" to forkret.
        let forkret = self.hal.forkret_addr();
        let p = &mut self.ptable.procs[slot];
        p.context = Context::first_return(forkret, kstack.top());
        p.kstack = Some(kstack);
        p.killed = false;
        p.chan = None;
        p.parent = None;

        p.virtual_runtime = 0;
        p.current_runtime = 0;
        p.max_exec_time = 0;
        p.nice = 0;
        p.proc_weight = 0;
        p.node = RbNode::new();

        Ok(ProcId(slot))
    }

    /// Reclaim a descriptor and everything hanging off it.
    /// ptable.lock must be held.
    fn freeproc(&mut self, id: ProcId) {
        let Kernel { hal, ptable, .. } = self;
        let p = &mut ptable.procs[id.0];
        if let Some(kstack) = p.kstack.take() {
            hal.kfree(kstack);
        }
        if let Some(pgdir) = p.pgdir.take() {
            hal.freevm(pgdir);
        }
        p.pid = 0;
        p.parent = None;
        p.name.clear();
        p.killed = false;
        p.chan = None;
        p.sz = 0;
        p.state = ProcState::Unused;
    }

    /// Set up the first user process around the embedded initcode
    /// image and hand it to the runqueue.
    pub fn userinit(&mut self) {
        let Ok(id) = self.allocproc() else {
            panic!("userinit: out of memory");
        };
        self.ptable.initproc = Some(id);

        let Some(mut pgdir) = self.hal.setupkvm() else {
            panic!("userinit: out of memory");
        };
        self.hal.inituvm(&mut pgdir, self.hal.initcode());
        let cwd = self.hal.namei("/");
        let p = &mut self.ptable.procs[id.0];
        p.pgdir = Some(pgdir);
        p.sz = PGSIZE;
        p.tf = TrapFrame::user_init(PGSIZE);
        p.name.push_str("initcode");
        p.cwd = cwd;

        self.acquire_ptable();
        self.ptable.procs[id.0].state = ProcState::Runnable;
        self.release_ptable();
        self.insert_task(id);
    }

    /// Create a new process copying the current one. Returns the child
    /// pid to the parent; the child's trap frame is doctored so it sees
    /// zero when it eventually returns from the syscall.
    pub fn fork(&mut self) -> Result<i32, ProcError> {
        let curr = self.myproc().expect("fork");
        let child = self.allocproc()?;

        // Copy the address space; a failed copy unwinds the embryo.
        let sz = self.ptable.procs[curr.0].sz;
        let copied = {
            let pgdir = self.ptable.procs[curr.0].pgdir.as_ref().expect("fork pgdir");
            self.hal.copyuvm(pgdir, sz)
        };
        let Some(pgdir) = copied else {
            let kstack = self.ptable.procs[child.0].kstack.take().expect("fork kstack");
            self.hal.kfree(kstack);
            self.ptable.procs[child.0].state = ProcState::Unused;
            return Err(ProcError::Allocation);
        };
        self.ptable.procs[child.0].pgdir = Some(pgdir);

        let Kernel { hal, ptable, .. } = self;
        let (parent, chld) = pair_mut(&mut ptable.procs, curr.0, child.0);
        chld.sz = parent.sz;
        chld.parent = Some(curr);
        chld.tf = parent.tf;
        // Clear a0 so that fork returns 0 in the child.
        chld.tf.a0 = 0;

        for (pf, cf) in parent.ofile.iter().zip(chld.ofile.iter_mut()) {
            if let Some(f) = pf {
                *cf = Some(hal.filedup(f));
            }
        }
        chld.cwd = parent.cwd.as_ref().map(|ip| hal.idup(ip));
        chld.name = parent.name;
        let pid = chld.pid;

        self.acquire_ptable();
        self.ptable.procs[child.0].state = ProcState::Runnable;
        self.release_ptable();
        self.insert_task(child);

        Ok(pid)
    }

    /// Exit the current process. Does not return. The dead process
    /// stays a zombie until its parent calls wait().
    pub fn exit(&mut self) -> ! {
        let curr = self.myproc().expect("exit");
        if self.ptable.initproc == Some(curr) {
            panic!("init exiting");
        }

        // Close all open files.
        for fd in 0..NOFILE {
            if let Some(f) = self.ptable.procs[curr.0].ofile[fd].take() {
                self.hal.fileclose(f);
            }
        }

        self.hal.begin_op();
        if let Some(cwd) = self.ptable.procs[curr.0].cwd.take() {
            self.hal.iput(cwd);
        }
        self.hal.end_op();

        self.acquire_ptable();

        // Parent might be sleeping in wait().
        if let Some(parent) = self.ptable.procs[curr.0].parent {
            self.wakeup1(Chan::proc(parent));
        }

        // Pass abandoned children to init.
        let initproc = self.ptable.initproc;
        for i in 0..NPROC {
            if self.ptable.procs[i].parent == Some(curr) {
                self.ptable.procs[i].parent = initproc;
                if self.ptable.procs[i].state == ProcState::Zombie {
                    if let Some(ip) = initproc {
                        self.wakeup1(Chan::proc(ip));
                    }
                }
            }
        }

        // Jump into the scheduler, never to return.
        self.ptable.procs[curr.0].state = ProcState::Zombie;
        self.sched();
        panic!("zombie exit");
    }

    /// Wait for a child process to exit and return its pid.
    pub fn wait(&mut self) -> Result<i32, ProcError> {
        let curr = self.myproc().expect("wait");
        self.acquire_ptable();
        loop {
            // Scan the table looking for exited children.
            let mut havekids = false;
            let mut zombie = None;
            for i in 0..NPROC {
                let p = &self.ptable.procs[i];
                if p.parent != Some(curr) {
                    continue;
                }
                havekids = true;
                if p.state == ProcState::Zombie {
                    zombie = Some((ProcId(i), p.pid));
                    break;
                }
            }

            if let Some((id, pid)) = zombie {
                self.freeproc(id);
                self.release_ptable();
                return Ok(pid);
            }

            // No point waiting if we don't have any children.
            if !havekids {
                self.release_ptable();
                return Err(ProcError::NoChildren);
            }
            if self.ptable.procs[curr.0].killed {
                self.release_ptable();
                return Err(ProcError::Killed);
            }

            // Wait for children to exit.
            self.sleep_locked(Chan::proc(curr));
        }
    }

    /// Kill the process with the given pid. The victim won't die until
    /// it next crosses the trap boundary and observes the flag; a
    /// sleeping victim is promoted so it gets there.
    pub fn kill(&mut self, pid: i32) -> Result<(), ProcError> {
        self.acquire_ptable();
        for i in 0..NPROC {
            let p = &self.ptable.procs[i];
            if p.pid != pid || p.state == ProcState::Unused {
                continue;
            }
            self.ptable.procs[i].killed = true;
            // Wake it from sleep if necessary.
            if self.ptable.procs[i].state == ProcState::Sleeping {
                self.make_runnable(ProcId(i));
            }
            self.release_ptable();
            return Ok(());
        }
        self.release_ptable();
        Err(ProcError::NotFound)
    }

    /// Adjust a process's niceness. Takes effect the next time the
    /// process is queued, when its weight is rederived.
    pub fn setnice(&mut self, pid: i32, nice: u32) -> Result<(), ProcError> {
        self.acquire_ptable();
        for i in 0..NPROC {
            let p = &mut self.ptable.procs[i];
            if p.pid == pid && p.state != ProcState::Unused {
                p.nice = nice.min(NICE_LIMIT);
                self.release_ptable();
                return Ok(());
            }
        }
        self.release_ptable();
        Err(ProcError::NotFound)
    }

    /// Grow or shrink the current process's memory by n bytes, then
    /// reinstall its address space.
    pub fn growproc(&mut self, n: i32) -> Result<(), ProcError> {
        let curr = self.myproc().expect("growproc");
        let Kernel { hal, ptable, .. } = self;
        let p = &mut ptable.procs[curr.0];
        let sz = p.sz;
        let newsz = sz.wrapping_add(n as isize as usize);
        if n > 0 {
            let pgdir = p.pgdir.as_mut().expect("growproc pgdir");
            let Some(grown) = hal.allocuvm(pgdir, sz, newsz) else {
                return Err(ProcError::Allocation);
            };
            p.sz = grown;
        } else if n < 0 {
            let pgdir = p.pgdir.as_mut().expect("growproc pgdir");
            let shrunk = hal.deallocuvm(pgdir, sz, newsz);
            if shrunk == 0 {
                return Err(ProcError::Allocation);
            }
            p.sz = shrunk;
        }
        hal.switchuvm(
            p.kstack.as_ref().expect("growproc kstack"),
            p.pgdir.as_ref().expect("growproc pgdir"),
        );
        Ok(())
    }

    /// Print a process listing to the console. For debugging.
    /// Runs when a user types ^P on the console.
    /// No lock, to avoid wedging a stuck machine further.
    pub fn procdump(&self) {
        for p in self.ptable.procs.iter() {
            if p.state == ProcState::Unused {
                continue;
            }
            kprint!(self.hal, "{} {} {}", p.pid, p.state.name(), p.name);
            if p.state == ProcState::Sleeping {
                let mut pcs = [0usize; 10];
                let n = self.hal.stack_trace(p.context.s0, &mut pcs);
                for pc in &pcs[..n] {
                    kprint!(self.hal, " {:#x}", pc);
                }
            }
            kprintln!(self.hal);
        }
    }
}
