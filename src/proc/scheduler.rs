//! The per-CPU scheduler loop and the context-switch discipline.
//!
//! `schedule` and `sched` form a coroutine pair over the platform's
//! register-save primitive: the scheduler switches into a process, and
//! the process switches back through `sched` when it yields, sleeps or
//! exits. Whoever is running holds ptable.lock across the switch, so
//! the state it changed and the switch itself are one atomic step as
//! far as the other CPUs are concerned.

use super::process::{Chan, ProcId, ProcState};
use crate::hal::Hal;
use crate::kernel::Kernel;
use crate::param::NPROC;
use crate::runqueue::check_preemption;
use crate::sync::Spinlock;

impl<H: Hal> Kernel<H> {
    /// Per-CPU process scheduler; never returns.
    /// Each CPU calls this after setting itself up. It loops, picking
    /// the most entitled runnable process, switching to it, and taking
    /// the CPU back when the process lets go.
    pub fn scheduler(&mut self) -> ! {
        loop {
            self.schedule();
        }
    }

    /// One scheduling round: drain the runqueue, then come up for air
    /// with interrupts briefly enabled so a tick can land while idle.
    pub fn schedule(&mut self) {
        // Enable interrupts on this processor.
        self.hal.enable_interrupts();

        self.acquire_ptable();
        loop {
            let Some(id) = self.retrieve_task() else {
                break;
            };
            if self.ptable.procs[id.0].state != ProcState::Runnable {
                continue;
            }

            // Switch to the chosen process. It is the process's job to
            // release ptable.lock and then reacquire it before jumping
            // back to us.
            let Kernel {
                hal, cpus, ptable, ..
            } = self;
            let cid = hal.cpu_id();
            let p = &mut ptable.procs[id.0];
            cpus[cid].proc = Some(id);
            hal.switchuvm(
                p.kstack.as_ref().expect("scheduler kstack"),
                p.pgdir.as_ref().expect("scheduler pgdir"),
            );
            p.state = ProcState::Running;

            unsafe { hal.swtch(&mut cpus[cid].scheduler, &p.context) };
            hal.switchkvm();

            // The process is done running for now.
            cpus[cid].proc = None;
        }
        self.release_ptable();
    }

    /// Switch to the scheduler. Must hold only ptable.lock and have
    /// already changed the process's state. Saves and restores intena
    /// because intena is a property of this kernel thread, not this
    /// CPU. It should be per-process, but that would break in the few
    /// places where a lock is held and there is no process.
    pub(crate) fn sched(&mut self) {
        let p = self.myproc().expect("sched");
        let Kernel {
            hal, cpus, ptable, ..
        } = self;
        let cid = hal.cpu_id();
        if !ptable.lock.holding(cid) {
            panic!("sched ptable.lock");
        }
        if cpus[cid].noff != 1 {
            panic!("sched locks");
        }
        if ptable.procs[p.0].state == ProcState::Running {
            panic!("sched running");
        }
        if hal.interrupts_enabled() {
            panic!("sched interruptible");
        }

        let intena = cpus[cid].intena;
        unsafe { hal.swtch(&mut ptable.procs[p.0].context, &cpus[cid].scheduler) };
        // Possibly resumed on a different CPU; intena travels with the
        // kernel thread.
        let cid = hal.cpu_id();
        cpus[cid].intena = intena;
    }

    /// Give up the CPU for one scheduling round, if the fairness policy
    /// agrees the running process is no longer the best use of it.
    pub fn yield_cpu(&mut self) {
        let curr = self.myproc().expect("yield");
        self.acquire_ptable();
        let preempt = {
            let Kernel { ptable, tasks, .. } = self;
            let min = tasks.min_vruntime().map(|m| &ptable.procs[m.0]);
            check_preemption(&ptable.procs[curr.0], min)
        };
        if preempt {
            self.make_runnable(curr);
            self.sched();
        }
        self.release_ptable();
    }

    /// Timer tick delivered while a process runs: account the tick to
    /// its slice, then let the policy decide whether to preempt.
    pub fn timer_tick(&mut self) {
        if let Some(curr) = self.myproc() {
            self.ptable.procs[curr.0].current_runtime += 1;
            self.yield_cpu();
        }
    }

    /// Atomically release `lk` and sleep on `chan`; reacquires `lk`
    /// when awakened. `lk` is some lock other than ptable.lock: the
    /// kernel swaps ptable.lock in before letting go of `lk`, and since
    /// every wakeup runs under ptable.lock, no wakeup can slip into the
    /// gap. (wait() already holds ptable.lock and sleeps through the
    /// internal variant.)
    pub fn sleep(&mut self, chan: Chan, lk: &Spinlock) {
        if self.myproc().is_none() {
            panic!("sleep");
        }

        // Must hold ptable.lock in order to change state and call
        // sched; once it is held, releasing lk is safe.
        self.acquire_ptable();
        {
            let Kernel { hal, cpus, .. } = self;
            lk.release(cpus, hal);
        }

        self.sleep_locked(chan);

        // Reacquire the original lock.
        self.release_ptable();
        let Kernel { hal, cpus, .. } = self;
        lk.acquire(cpus, hal);
    }

    /// Sleep on chan with ptable.lock already held.
    pub(crate) fn sleep_locked(&mut self, chan: Chan) {
        let p = self.myproc().expect("sleep");

        // Go to sleep.
        {
            let pr = &mut self.ptable.procs[p.0];
            pr.chan = Some(chan);
            pr.state = ProcState::Sleeping;
        }
        self.sched();

        // Tidy up.
        self.ptable.procs[p.0].chan = None;
    }

    /// Wake up all processes sleeping on chan.
    /// ptable.lock must be held.
    pub(crate) fn wakeup1(&mut self, chan: Chan) {
        for i in 0..NPROC {
            if self.ptable.procs[i].state == ProcState::Sleeping
                && self.ptable.procs[i].chan == Some(chan)
            {
                self.make_runnable(ProcId(i));
            }
        }
    }

    /// Wake up all processes sleeping on chan.
    pub fn wakeup(&mut self, chan: Chan) {
        self.acquire_ptable();
        self.wakeup1(chan);
        self.release_ptable();
    }

    /// Put a process back on the runqueue, folding the slice it just
    /// consumed into its virtual runtime so the tree stays honest.
    pub(crate) fn make_runnable(&mut self, id: ProcId) {
        {
            let p = &mut self.ptable.procs[id.0];
            p.state = ProcState::Runnable;
            p.virtual_runtime += p.current_runtime;
            p.current_runtime = 0;
        }
        self.insert_task(id);
    }

    /// A fork child's very first scheduling switches here. Finish the
    /// handoff from the scheduler, then return toward user space.
    pub fn forkret(&mut self) {
        // Still holding ptable.lock from the scheduler.
        self.release_ptable();

        if self.first {
            // Filesystem bring-up sleeps, so it cannot run at boot; it
            // runs once in the context of the first scheduled process.
            self.first = false;
            self.hal.fsinit();
        }
    }
}
