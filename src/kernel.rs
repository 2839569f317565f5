//! The kernel context object.
//!
//! The descriptor pool, the runqueue, the pid counter and the per-CPU
//! slots are process-wide singletons. They are constructed once at boot
//! and threaded by reference into every operation, so the whole
//! scheduling core is one value parameterized over its platform.

use crate::hal::Hal;
use crate::param::{NCPU, NPROC};
use crate::proc::process::ProcTable;
use crate::proc::{Cpu, ProcId};
use crate::runqueue::RunQueue;
use crate::sync::{pop_off, push_off};

pub struct Kernel<H: Hal> {
    pub(crate) hal: H,
    pub(crate) cpus: [Cpu; NCPU],
    pub(crate) ptable: ProcTable,
    pub(crate) tasks: RunQueue,
    /// One-shot guard for first-time fs init in forkret.
    pub(crate) first: bool,
}

impl<H: Hal> Kernel<H> {
    /// Boot-time construction of the process table and runqueue.
    pub fn new(hal: H) -> Kernel<H> {
        Kernel {
            hal,
            cpus: core::array::from_fn(|_| Cpu::new()),
            ptable: ProcTable::new(),
            tasks: RunQueue::new(NPROC),
            first: true,
        }
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    /// The process running on this CPU, or none. Interrupts are pushed
    /// off so the thread cannot migrate between looking up the CPU and
    /// reading its slot.
    pub fn myproc(&mut self) -> Option<ProcId> {
        let Kernel { hal, cpus, .. } = self;
        let id = push_off(cpus, hal);
        let p = cpus[id].proc;
        pop_off(cpus, hal);
        p
    }

    pub(crate) fn acquire_ptable(&mut self) {
        let Kernel { hal, cpus, ptable, .. } = self;
        ptable.lock.acquire(cpus, hal);
    }

    pub(crate) fn release_ptable(&mut self) {
        let Kernel { hal, cpus, ptable, .. } = self;
        ptable.lock.release(cpus, hal);
    }

    /// Queue a runnable process. The runqueue lock nests inside
    /// whatever the caller holds; ptable.lock before tasks, never the
    /// reverse.
    pub(crate) fn insert_task(&mut self, id: ProcId) {
        let Kernel {
            hal,
            cpus,
            ptable,
            tasks,
            ..
        } = self;
        tasks.lock.acquire(cpus, hal);
        tasks.insert(&mut ptable.procs, id);
        tasks.lock.release(cpus, hal);
    }

    /// Pull the most entitled runnable process off the runqueue.
    pub(crate) fn retrieve_task(&mut self) -> Option<ProcId> {
        let Kernel {
            hal,
            cpus,
            ptable,
            tasks,
            ..
        } = self;
        tasks.lock.acquire(cpus, hal);
        let found = tasks.extract_min(&mut ptable.procs);
        tasks.lock.release(cpus, hal);
        found
    }
}
