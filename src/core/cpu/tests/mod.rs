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

//! CPU test modules
//!
//! - `decode`: field extraction and instruction decoding
//! - `units`: stage pool and multiply/divide unit
//! - `basic`: straight-line execution and forwarding
//! - `memory`: loads, stores and memory stalls
//! - `branches`: delay slots and wrong-path squash
//! - `exceptions`: precise exceptions and program exit
//! - `faults`: fault points exercised by real instruction streams




#[cfg(test)]
mod exceptions;


#[cfg(test)]
mod memory;


use super::*;
use crate::core::fault::{parse_script, FaultRng, LegacySchedule, ScriptSchedule};
use crate::core::memory::LatencyMemory;

pub(super) const BASE: u32 = 0x0040_0000;

/// Hand assembler for the modeled subset
pub(super) mod asm {
    fn r(funct: u32, rs: u8, rt: u8, rd: u8, shamt: u8) -> u32 {
        ((rs as u32) << 21)
            | ((rt as u32) << 16)
            | ((rd as u32) << 11)
            | ((shamt as u32) << 6)
            | funct
    }

    fn i(op: u32, rs: u8, rt: u8, imm: i32) -> u32 {
        (op << 26) | ((rs as u32) << 21) | ((rt as u32) << 16) | (imm as u32 & 0xFFFF)
    }

    pub fn nop() -> u32 {
        0
    }
    pub fn sll(rd: u8, rt: u8, sa: u8) -> u32 {
        r(0x00, 0, rt, rd, sa)
    }
    pub fn addu(rd: u8, rs: u8, rt: u8) -> u32 {
        r(0x21, rs, rt, rd, 0)
    }
    pub fn add(rd: u8, rs: u8, rt: u8) -> u32 {
        r(0x20, rs, rt, rd, 0)
    }
    pub fn subu(rd: u8, rs: u8, rt: u8) -> u32 {
        r(0x23, rs, rt, rd, 0)
    }
    pub fn slt(rd: u8, rs: u8, rt: u8) -> u32 {
        r(0x2A, rs, rt, rd, 0)
    }
    pub fn jr(rs: u8) -> u32 {
        r(0x08, rs, 0, 0, 0)
    }
    pub fn syscall() -> u32 {
        0x0000_000C
    }
    pub fn brk() -> u32 {
        0x0000_000D
    }
    pub fn mfhi(rd: u8) -> u32 {
        r(0x10, 0, 0, rd, 0)
    }
    pub fn mflo(rd: u8) -> u32 {
        r(0x12, 0, 0, rd, 0)
    }
    pub fn mthi(rs: u8) -> u32 {
        r(0x11, rs, 0, 0, 0)
    }
    pub fn mult(rs: u8, rt: u8) -> u32 {
        r(0x18, rs, rt, 0, 0)
    }
    pub fn div(rs: u8, rt: u8) -> u32 {
        r(0x1A, rs, rt, 0, 0)
    }
    pub fn divu(rs: u8, rt: u8) -> u32 {
        r(0x1B, rs, rt, 0, 0)
    }
    pub fn addi(rt: u8, rs: u8, imm: i32) -> u32 {
        i(0x08, rs, rt, imm)
    }
    pub fn addiu(rt: u8, rs: u8, imm: i32) -> u32 {
        i(0x09, rs, rt, imm)
    }
    pub fn ori(rt: u8, rs: u8, imm: i32) -> u32 {
        i(0x0D, rs, rt, imm)
    }
    pub fn lui(rt: u8, imm: i32) -> u32 {
        i(0x0F, 0, rt, imm)
    }
    pub fn beq(rs: u8, rt: u8, offset: i32) -> u32 {
        i(0x04, rs, rt, offset)
    }
    pub fn bne(rs: u8, rt: u8, offset: i32) -> u32 {
        i(0x05, rs, rt, offset)
    }
    pub fn lw(rt: u8, offset: i32, base: u8) -> u32 {
        i(0x23, base, rt, offset)
    }
    pub fn lb(rt: u8, offset: i32, base: u8) -> u32 {
        i(0x20, base, rt, offset)
    }
    pub fn lbu(rt: u8, offset: i32, base: u8) -> u32 {
        i(0x24, base, rt, offset)
    }
    pub fn lh(rt: u8, offset: i32, base: u8) -> u32 {
        i(0x21, base, rt, offset)
    }
    pub fn sw(rt: u8, offset: i32, base: u8) -> u32 {
        i(0x2B, base, rt, offset)
    }
    pub fn sb(rt: u8, offset: i32, base: u8) -> u32 {
        i(0x28, base, rt, offset)
    }
    pub fn jal(address: u32) -> u32 {
        (0x03 << 26) | ((address >> 2) & 0x03FF_FFFF)
    }
    pub fn mtc1(rt: u8, fs: u8) -> u32 {
        (0x11 << 26) | (0x04 << 21) | ((rt as u32) << 16) | ((fs as u32) << 11)
    }
    pub fn mfc1(rt: u8, fs: u8) -> u32 {
        (0x11 << 26) | ((rt as u32) << 16) | ((fs as u32) << 11)
    }
}

/// CPU wired to a small reference memory
pub(super) struct Harness {
    pub cpu: Cpu,
    pub mem: LatencyMemory,
    /// Cycle the run finished on
    pub finished_at: Option<u64>,
}

impl Harness {
    pub fn new(words: Vec<u32>) -> Self {
        Self::with_faults(words, FaultChecker::disabled())
    }

    /// Run with the given fault script
    pub fn with_script(words: Vec<u32>, script: &str) -> Self {
        let entries = parse_script(script).unwrap();
        let faults = FaultChecker::with_schedules(
            LegacySchedule::disabled(),
            ScriptSchedule::from_entries(entries),
            FaultRng::new(42),
        );
        Self::with_faults(words, faults)
    }

    pub fn with_faults(words: Vec<u32>, faults: FaultChecker) -> Self {
        Self {
            cpu: Cpu::new(TextSegment::new(BASE, words), BASE, 8, faults),
            mem: LatencyMemory::with_latencies(0, 0x1_0000, vec![1]),
            finished_at: None,
        }
    }

    pub fn latencies(mut self, latencies: Vec<u64>) -> Self {
        self.mem = LatencyMemory::with_latencies(0, 0x1_0000, latencies);
        self
    }

    /// Preload memory and the golden image
    pub fn data(&mut self, address: u32, bytes: &[u8]) {
        self.mem.init_data(address, bytes).unwrap();
        self.cpu.context_mut().init_orig_mem(address, bytes);
    }

    pub fn try_run(&mut self, max_cycles: u64) -> crate::core::error::Result<RunOutcome> {
        for cycle in 0..max_cycles {
            self.cpu.rising_edge(cycle, &mut self.mem)?;
            self.cpu.falling_edge(cycle, &mut self.mem)?;
            if self.cpu.outcome().is_finished() {
                self.finished_at = Some(cycle);
                break;
            }
        }
        Ok(self.cpu.outcome())
    }

    pub fn run(&mut self) -> RunOutcome {
        self.try_run(500).unwrap()
    }
}
