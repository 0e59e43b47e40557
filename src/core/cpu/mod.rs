// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! MIPS 4Kc pipeline
//!
//! Five stations (IF, ID, EX, MEM, WB), one instruction per station. Each
//! pipeline cycle is split in two halves:
//!
//! - **rising**: collect memory responses, then issue the request of the
//!   record waiting in MEM
//! - **falling**: collect memory responses, then run the stations from WB
//!   back to IF; each station works on its record and hands it on when the
//!   next station is free
//!
//! Operands are read in ID with forwarding from the MEM and WB stations.
//! Branches resolve in EX with one delay slot. Exceptions are precise: they
//! take effect when the faulting record reaches WB, squashing everything
//! younger.

mod decode;
mod disassembler;
mod exception;
mod instruction;
mod mdu;
mod pipeline;
mod registers;
mod stage;
mod syscall;

#[cfg(test)]
mod tests;

use serde::Serialize;

use crate::core::error::Result;
use crate::core::fault::FaultChecker;
use crate::core::memory::{Correlator, MemorySubsystem};
use crate::core::value::{FaultContext, FaultValue};

pub use disassembler::Disassembler;
pub use exception::ExceptionCause;
pub use instruction::{Instruction, Op, Unit};
pub use mdu::{MduOp, MultiplyDivideUnit};
pub use registers::{FpRegisterFile, RegisterFile};
pub use stage::{StageId, StagePool, StageRecord, StageState, Station};
pub use syscall::{HaltOnSyscall, SyscallAction, SyscallHandler};

/// How a run ended, or that it has not
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    Running,
    /// Program exit through a syscall
    Exited(u32),
    /// Unhandled exception; `pc` is the restart address (the branch for a delay slot)
    Exception { cause: ExceptionCause, pc: u32 },
    /// Tick ceiling reached
    Timeout,
}

impl RunOutcome {
    pub fn is_finished(&self) -> bool {
        *self != RunOutcome::Running
    }
}

/// Pipeline counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Falling edges simulated
    pub cycles: u64,
    pub fetched: u64,
    pub retired: u64,
    pub squashed: u64,
    /// Cycles MEM waited for a response
    pub mem_stall_count: u64,
    /// Requests sent to memory
    pub total_mem_ops: u64,
    /// Cycles ID waited for an operand
    pub hazard_stalls: u64,
    /// Cycles EX waited for the multiply/divide unit
    pub mdu_stalls: u64,
}

/// Program image the pipeline fetches from
///
/// Instruction fetch reads this image directly; it is not routed through
/// the memory subsystem.
#[derive(Debug, Clone)]
pub struct TextSegment {
    pub base: u32,
    pub words: Vec<u32>,
}

impl TextSegment {
    pub fn new(base: u32, words: Vec<u32>) -> Self {
        Self { base, words }
    }

    /// Word at `address`, if it lies in the segment
    pub fn fetch(&self, address: u32) -> Option<u32> {
        let offset = address.checked_sub(self.base)?;
        self.words.get((offset / 4) as usize).copied()
    }
}

/// MIPS 4Kc pipeline state
pub struct Cpu {
    regs: RegisterFile,
    fpr: FpRegisterFile,
    mdu: MultiplyDivideUnit,

    /// Next fetch address
    pc: FaultValue,
    text: TextSegment,

    pool: StagePool,
    /// Record held by each station, indexed by [`Station::index`]
    latches: [Option<StageId>; 5],
    correlator: Correlator<StageId>,

    faults: FaultChecker,
    ctx: FaultContext,
    syscalls: Box<dyn SyscallHandler>,

    cycle: u64,
    outcome: RunOutcome,
    seq: u64,
    stats: PipelineStats,
}

impl Cpu {
    /// Pipeline about to fetch from `entry`
    ///
    /// # Example
    /// ```
    /// use mips4kc::core::cpu::{Cpu, TextSegment};
    /// use mips4kc::core::fault::FaultChecker;
    ///
    /// let text = TextSegment::new(0x0040_0000, vec![0x2402_000A, 0x0000_000C]);
    /// let cpu = Cpu::new(text, 0x0040_0000, 8, FaultChecker::disabled());
    /// assert_eq!(cpu.pc(), 0x0040_0000);
    /// assert_eq!(cpu.reg(0), 0);
    /// ```
    pub fn new(text: TextSegment, entry: u32, pool_capacity: usize, faults: FaultChecker) -> Self {
        Self {
            regs: RegisterFile::new(),
            fpr: FpRegisterFile::new(),
            mdu: MultiplyDivideUnit::new(),
            pc: FaultValue::new(entry),
            text,
            pool: StagePool::new(pool_capacity),
            latches: [None; 5],
            correlator: Correlator::new(),
            faults,
            ctx: FaultContext::new(),
            syscalls: Box::new(HaltOnSyscall),
            cycle: 0,
            outcome: RunOutcome::Running,
            seq: 0,
            stats: PipelineStats::default(),
        }
    }

    /// Replace the syscall handler
    pub fn set_syscall_handler(&mut self, handler: Box<dyn SyscallHandler>) {
        self.syscalls = handler;
    }

    /// Advance the clock seen by the fault checker and fault timestamps
    #[inline(always)]
    pub fn set_cycle(&mut self, cycle: u64) {
        self.cycle = cycle;
        self.faults.set_cycle(cycle);
        self.ctx.set_now(cycle);
    }

    /// First half of a cycle: issue the pending memory request
    ///
    /// # Errors
    ///
    /// A response that cannot be attributed to an outstanding request.
    pub fn rising_edge(&mut self, cycle: u64, memory: &mut dyn MemorySubsystem) -> Result<()> {
        if self.outcome.is_finished() {
            return Ok(());
        }
        self.set_cycle(cycle);
        self.collect_responses(memory)?;
        self.issue_memory(memory);
        Ok(())
    }

    /// Second half of a cycle: run the stations from WB back to IF
    ///
    /// # Errors
    ///
    /// Protocol violations, a fired control-path fault, or an exhausted
    /// stage pool.
    pub fn falling_edge(&mut self, cycle: u64, memory: &mut dyn MemorySubsystem) -> Result<()> {
        if self.outcome.is_finished() {
            return Ok(());
        }
        self.set_cycle(cycle);
        self.collect_responses(memory)?;
        self.complete_mdu();

        self.writeback();
        if self.outcome.is_finished() {
            return Ok(());
        }
        self.memory_access()?;
        self.execute()?;
        self.decode();
        self.fetch()?;

        self.stats.cycles += 1;
        for id in self.latches.iter().flatten() {
            self.pool[*id].cycles += 1;
        }
        Ok(())
    }

    /// End the run from outside (tick ceiling)
    pub fn time_out(&mut self) {
        if !self.outcome.is_finished() {
            log::info!("Timeout reached @ {}", self.cycle);
            self.outcome = RunOutcome::Timeout;
        }
    }

    pub fn outcome(&self) -> RunOutcome {
        self.outcome
    }

    /// Next fetch address
    pub fn pc(&self) -> u32 {
        self.pc.data()
    }

    #[inline(always)]
    pub fn reg(&self, index: u8) -> u32 {
        self.regs.value(index)
    }

    /// Set a register before the run starts
    pub fn set_reg(&mut self, index: u8, value: u32) {
        self.regs.set(index, value);
    }

    pub fn regs(&self) -> &RegisterFile {
        &self.regs
    }

    pub fn fpr(&self, index: u8) -> u32 {
        self.fpr.read(index).data()
    }

    pub fn hi(&self) -> u32 {
        self.mdu.hi().data()
    }

    pub fn lo(&self) -> u32 {
        self.mdu.lo().data()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn faults(&self) -> &FaultChecker {
        &self.faults
    }

    pub fn context(&self) -> &FaultContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut FaultContext {
        &mut self.ctx
    }

    pub fn correlator(&self) -> &Correlator<StageId> {
        &self.correlator
    }

    pub fn pool(&self) -> &StagePool {
        &self.pool
    }

    /// Record currently held by `station`
    pub fn at(&self, station: Station) -> Option<&StageRecord> {
        self.latches[station.index()].and_then(|id| self.pool.get(id))
    }

    /// Instructions in flight
    pub fn in_flight(&self) -> usize {
        self.latches.iter().flatten().count()
    }

    /// Dump pipeline counters
    pub fn print_stats(&self) {
        let s = &self.stats;
        log::info!(
            "Pipeline: {} cycles, {} retired, {} squashed",
            s.cycles,
            s.retired,
            s.squashed
        );
        log::info!("  Memory stall count: {}", s.mem_stall_count);
        log::info!("  Total memory operations: {}", s.total_mem_ops);
        log::info!(
            "  Hazard stalls: {}, MDU stalls: {}",
            s.hazard_stalls,
            s.mdu_stalls
        );
    }
}
