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

//! Station drivers
//!
//! Each driver works on the record in its own latch and then tries to hand
//! it to the next station. The falling edge runs them from WB back to IF,
//! so a record moves at most one station per cycle and a station freed
//! this cycle can be refilled by its predecessor.

use super::disassembler::Disassembler;
use super::exception::ExceptionCause;
use super::instruction::{Instruction, Op, Unit};
use super::mdu::MduOp;
use super::stage::{StageId, StageRecord, StageState, Station};
use super::syscall::SyscallAction;
use super::{Cpu, RunOutcome};
use crate::core::error::Result;
use crate::core::memory::{bytes_to_u32, MemRequest, MemorySubsystem};
use crate::core::value::FaultValue;

/// Where an operand comes from this cycle
enum Operand {
    /// Register file, or the WB station
    Value(FaultValue),
    /// MEM station bypass
    Bypass(FaultValue),
    /// Producer has not got its result yet
    Stall,
}

impl Cpu {
    #[inline(always)]
    fn latch(&self, station: Station) -> Option<StageId> {
        self.latches[station.index()]
    }

    /// Move the record at `from` to the next station if it is free
    fn advance(&mut self, from: Station) -> bool {
        let Some(to) = from.next() else {
            return false;
        };
        match (self.latches[from.index()], self.latches[to.index()]) {
            (Some(id), None) => {
                self.latches[from.index()] = None;
                self.latches[to.index()] = Some(id);
                self.pool[id].station = to;
                true
            }
            (Some(id), Some(_)) => {
                self.pool[id].stall_cycles += 1;
                false
            }
            _ => false,
        }
    }

    /// Drop the record held by `station`, abandoning its memory request
    fn squash(&mut self, station: Station) {
        let Some(id) = self.latches[station.index()].take() else {
            return;
        };
        if let Some(record) = self.pool.free(id) {
            if let Some(request) = record.request {
                self.correlator.abandon(request);
            }
            log::debug!(
                "Squashed {} at 0x{:08x} in {} @ {}",
                id,
                record.pc,
                station,
                self.cycle
            );
            self.stats.squashed += 1;
        }
    }

    /// Squash everything younger than the record in WB
    fn squash_younger(&mut self) {
        for station in [Station::Mem, Station::Ex, Station::Id, Station::If] {
            self.squash(station);
        }
    }

    /// Hand arriving responses to the correlator
    pub(super) fn collect_responses(&mut self, memory: &mut dyn MemorySubsystem) -> Result<()> {
        for response in memory.poll(self.cycle) {
            self.correlator.complete(response)?;
        }
        Ok(())
    }

    /// Commit a finished multiply/divide to HI/LO
    pub(super) fn complete_mdu(&mut self) {
        if self.mdu.complete(self.cycle) {
            let (hi, lo) = self.mdu.hi_lo_mut();
            self.faults.inject_mdu(hi, lo, &mut self.ctx);
        }
    }

    // ---------------------------------------------------------------- WB

    pub(super) fn writeback(&mut self) {
        let Some(id) = self.latch(Station::Wb) else {
            return;
        };
        let record = self.pool[id].clone();

        if let Some(cause) = record.exception {
            log::warn!(
                "{} exception at 0x{:08x} @ {}",
                cause.mnemonic(),
                record.pc,
                self.cycle
            );
            self.squash_younger();
            self.retire(id);
            self.outcome = RunOutcome::Exception {
                cause,
                pc: record.exception_pc(),
            };
            return;
        }

        if record.inst.op == Op::Syscall {
            match self.syscalls.syscall(record.pc, &mut self.regs) {
                // Younger records may have read registers the handler changed
                SyscallAction::Continue => {
                    self.squash_younger();
                    self.pc = FaultValue::new(record.resume_pc());
                }
                SyscallAction::Exit(code) => {
                    self.squash_younger();
                    self.retire(id);
                    self.outcome = RunOutcome::Exited(code);
                    return;
                }
            }
        }

        if let Some(dest) = record.inst.dest() {
            let mut value = record.result;
            self.faults.inject_wb(&mut value, &mut self.ctx);
            self.faults.write_back_with_addr_fault(
                self.regs.cells_mut(),
                dest as usize,
                value,
                &mut self.ctx,
            );
        }
        if let Some(fd) = record.inst.fp_dest() {
            self.fpr.write(fd, record.result, &mut self.ctx);
        }
        self.retire(id);
    }

    fn retire(&mut self, id: StageId) {
        self.latches[Station::Wb.index()] = None;
        if let Some(mut record) = self.pool.free(id) {
            record.state = StageState::WrittenBack;
            log::trace!(
                "Retired 0x{:08x} {} after {} cycles ({} stalled)",
                record.pc,
                Disassembler::format(&record.inst, record.pc),
                self.cycle - record.fetched_at,
                record.stall_cycles
            );
            self.stats.retired += 1;
        }
    }

    // --------------------------------------------------------------- MEM

    /// Rising edge: send the request of the record waiting in MEM
    ///
    /// Nothing is issued while the record in WB is about to raise an
    /// exception or stop the program, so no store escapes a precise stop.
    pub(super) fn issue_memory(&mut self, memory: &mut dyn MemorySubsystem) {
        let Some(id) = self.latch(Station::Mem) else {
            return;
        };
        if let Some(wb) = self.latch(Station::Wb) {
            if self.pool[wb].is_serializing() {
                return;
            }
        }

        let record = &mut self.pool[id];
        if !record.is_memory_op() || record.sent {
            return;
        }
        let Some(size) = record.inst.access_size() else {
            return;
        };
        let is_load = record.inst.is_load();

        self.faults.inject_mem_pre(
            &mut record.addr,
            &mut record.store_data,
            is_load,
            &mut self.ctx,
        );

        let address = record.addr.data();
        if address % size != 0 {
            log::debug!("Unaligned {}-byte access at 0x{:08x}", size, address);
            record.exception = Some(if is_load {
                ExceptionCause::AddressErrorLoad
            } else {
                ExceptionCause::AddressErrorStore
            });
            return;
        }

        record.paddr = address;
        let request_id = self.correlator.issue(id);
        let request = if is_load {
            MemRequest::read(request_id, address, size)
        } else {
            self.ctx.record_store(&record.addr, &record.store_data, size);
            MemRequest::write(request_id, address, size, record.store_data.data())
        };
        record.request = Some(request_id);
        record.sent = true;
        record.state = StageState::MemoryIssued;
        self.stats.total_mem_ops += 1;
        memory.send(request);
    }

    /// Falling edge: wait for the response, then move on to WB
    pub(super) fn memory_access(&mut self) -> Result<()> {
        let Some(id) = self.latch(Station::Mem) else {
            return Ok(());
        };
        let record = &mut self.pool[id];

        if record.is_memory_op() && record.state != StageState::MemoryComplete {
            let payload = match record.request {
                Some(request) => self.correlator.take(request, id)?,
                None => None,
            };
            let Some(payload) = payload else {
                record.stall_cycles += 1;
                self.stats.mem_stall_count += 1;
                log::trace!("MEM stall on 0x{:08x} @ {}", record.pc, self.cycle);
                return Ok(());
            };

            if record.inst.is_load() {
                let size = record.inst.access_size().unwrap_or(4);
                let external = bytes_to_u32(&payload);
                let expected = self.ctx.golden_read(record.paddr, size).unwrap_or(external);

                let mut value = FaultValue::derive(expected, &[&record.addr]);
                value.check_read_for_faults(record.paddr, external, size, &mut self.ctx);

                let op = record.inst.op;
                let mut loaded = FaultValue::compute([&value], |[raw]| match op {
                    Op::Lb => raw as u8 as i8 as i32 as u32,
                    Op::Lh => raw as u16 as i16 as i32 as u32,
                    Op::Lbu => raw & 0xFF,
                    Op::Lhu => raw & 0xFFFF,
                    _ => raw,
                });
                self.faults.inject_mem_post(&mut loaded, &mut self.ctx);
                record.result = loaded;
            }
            record.request = None;
            record.state = StageState::MemoryComplete;
        }

        self.advance(Station::Mem);
        Ok(())
    }

    // ---------------------------------------------------------------- EX

    pub(super) fn execute(&mut self) -> Result<()> {
        let Some(id) = self.latch(Station::Ex) else {
            return Ok(());
        };

        if !self.pool[id].executed {
            let record = self.pool[id].clone();
            let unit = record.inst.unit();
            let outcome = if record.exception.is_some() {
                Some(record)
            } else {
                match unit {
                    Unit::Alu => Some(self.execute_alu(record)),
                    Unit::Agu => Some(Self::execute_agu(record)),
                    Unit::Mdu => self.execute_mdu(record),
                    Unit::Branch => Some(self.execute_branch(record)?),
                    Unit::None => Some(Self::execute_move(record)),
                }
            };

            let Some(mut done) = outcome else {
                self.pool[id].stall_cycles += 1;
                self.stats.mdu_stalls += 1;
                log::trace!("EX stall, multiply/divide unit busy @ {}", self.cycle);
                return Ok(());
            };
            done.executed = true;
            done.state = StageState::Executing(unit);
            self.pool[id] = done;
        }

        self.advance(Station::Ex);
        Ok(())
    }

    fn execute_alu(&mut self, mut record: StageRecord) -> StageRecord {
        let (a, b) = (record.op1, record.op2);
        let Some(data) = Self::alu(&record.inst, a.data(), b.data()) else {
            return Self::overflow(record);
        };
        // A fault-free run may overflow where this one did not
        let golden = Self::alu(&record.inst, a.golden(), b.golden()).unwrap_or(data);

        let mut result = FaultValue::derive(data, &[&a, &b]).with_golden(golden);
        self.faults.inject_alu(&mut result, &mut self.ctx);
        record.result = result;
        record
    }

    /// ALU result, `None` on signed overflow
    fn alu(inst: &Instruction, x: u32, y: u32) -> Option<u32> {
        let imm = inst.simm();
        let zimm = inst.imm as u32;

        let data = match inst.op {
            Op::Sll => y << inst.shamt,
            Op::Srl => y >> inst.shamt,
            Op::Sra => ((y as i32) >> inst.shamt) as u32,
            Op::Sllv => y << (x & 0x1F),
            Op::Srlv => y >> (x & 0x1F),
            Op::Srav => ((y as i32) >> (x & 0x1F)) as u32,
            Op::Add => (x as i32).checked_add(y as i32)? as u32,
            Op::Addi => (x as i32).checked_add(imm as i32)? as u32,
            Op::Sub => (x as i32).checked_sub(y as i32)? as u32,
            Op::Addu => x.wrapping_add(y),
            Op::Subu => x.wrapping_sub(y),
            Op::Addiu => x.wrapping_add(imm),
            Op::And => x & y,
            Op::Or => x | y,
            Op::Xor => x ^ y,
            Op::Nor => !(x | y),
            Op::Slt => ((x as i32) < (y as i32)) as u32,
            Op::Sltu => (x < y) as u32,
            Op::Slti => ((x as i32) < (imm as i32)) as u32,
            Op::Sltiu => (x < imm) as u32,
            Op::Andi => x & zimm,
            Op::Ori => x | zimm,
            Op::Xori => x ^ zimm,
            Op::Lui => zimm << 16,
            _ => 0,
        };
        Some(data)
    }

    fn overflow(mut record: StageRecord) -> StageRecord {
        log::debug!("Integer overflow at 0x{:08x}", record.pc);
        record.exception = Some(ExceptionCause::Overflow);
        record
    }

    fn execute_agu(mut record: StageRecord) -> StageRecord {
        let offset = record.inst.simm();
        record.addr = FaultValue::compute([&record.op1], |[base]| base.wrapping_add(offset));
        record.store_data = record.op2;
        record
    }

    /// `None` while the unit is busy
    fn execute_mdu(&mut self, mut record: StageRecord) -> Option<StageRecord> {
        if self.mdu.busy(self.cycle) {
            return None;
        }
        let op = match record.inst.op {
            Op::Mult => Some(MduOp::Mult),
            Op::Multu => Some(MduOp::Multu),
            Op::Div => Some(MduOp::Div),
            Op::Divu => Some(MduOp::Divu),
            _ => None,
        };
        match (op, record.inst.op) {
            (Some(op), _) => self.mdu.start(op, &record.op1, &record.op2, self.cycle),
            (None, Op::Mfhi) => record.result = self.mdu.hi(),
            (None, Op::Mflo) => record.result = self.mdu.lo(),
            (None, Op::Mthi) => self.mdu.set_hi(record.op1),
            (None, Op::Mtlo) => self.mdu.set_lo(record.op1),
            _ => {}
        }
        Some(record)
    }

    fn execute_branch(&mut self, mut record: StageRecord) -> Result<StageRecord> {
        self.faults.inject_control()?;

        let inst = record.inst;
        let (a, b) = (record.op1, record.op2);
        let (x, y) = (a.data() as i32, b.data() as i32);
        let next = record.pc.wrapping_add(4);
        let branch_target = next.wrapping_add(inst.simm() << 2);
        let jump_target = (next & 0xF000_0000) | (inst.target << 2);

        let target = match inst.op {
            Op::Beq => (x == y).then_some(branch_target),
            Op::Bne => (x != y).then_some(branch_target),
            Op::Blez => (x <= 0).then_some(branch_target),
            Op::Bgtz => (x > 0).then_some(branch_target),
            Op::Bltz => (x < 0).then_some(branch_target),
            Op::Bgez => (x >= 0).then_some(branch_target),
            Op::J | Op::Jal => Some(jump_target),
            Op::Jr | Op::Jalr => Some(a.data()),
            _ => None,
        };

        if matches!(inst.op, Op::Jal | Op::Jalr) {
            record.result = FaultValue::new(record.pc.wrapping_add(8));
        }

        let delay_slot = self.latch(Station::Id);
        if let Some(slot) = delay_slot {
            self.pool[slot].dslot = true;
        }
        if let Some(target) = target {
            log::trace!("Branch at 0x{:08x} taken to 0x{:08x}", record.pc, target);
            // Anything fetched past the delay slot is on the wrong path
            self.squash(Station::If);
            if let Some(slot) = delay_slot {
                self.pool[slot].branch_target = Some(target);
            }
            self.pc = FaultValue::derive(target, &[&a, &b]);
        }
        Ok(record)
    }

    fn execute_move(mut record: StageRecord) -> StageRecord {
        match record.inst.op {
            Op::Mfc1 => record.result = record.fop,
            Op::Mtc1 => record.result = record.op2,
            _ => {}
        }
        record
    }

    // ---------------------------------------------------------------- ID

    pub(super) fn decode(&mut self) {
        let Some(id) = self.latch(Station::Id) else {
            return;
        };

        if self.pool[id].state == StageState::Fetched {
            self.decode_record(id);
        }

        if !self.pool[id].operands_read && !self.read_operands(id) {
            self.pool[id].stall_cycles += 1;
            self.stats.hazard_stalls += 1;
            log::trace!("ID stall on operand hazard @ {}", self.cycle);
            return;
        }

        self.advance(Station::Id);
    }

    fn decode_record(&mut self, id: StageId) {
        let record = &mut self.pool[id];
        record.state = StageState::Decoded;
        if record.exception.is_some() {
            return;
        }

        self.faults.note_decode();
        let mut encoding = record.encoding;
        if let Some(fault) = self.faults.inject_inst_type(&mut encoding, &mut self.ctx) {
            log::info!(
                "  INST_TYPE: {} -> {}",
                Disassembler::disassemble(record.encoding, record.pc),
                Disassembler::disassemble(encoding, record.pc)
            );
            record.encoding = encoding;
            record.inst_fault = Some(fault);
        }

        record.inst = Instruction::decode(encoding);
        record.exception = match record.inst.op {
            Op::Reserved => Some(ExceptionCause::ReservedInstruction),
            Op::Break => Some(ExceptionCause::Breakpoint),
            _ => None,
        };
    }

    /// Look up the value of `reg` as seen by the record in ID
    fn resolve(&self, reg: u8) -> Operand {
        if reg == 0 {
            return Operand::Value(FaultValue::new(0));
        }
        // Youngest producer first
        for station in [Station::Ex, Station::Mem, Station::Wb] {
            let Some(record) = self.latch(station).and_then(|id| self.pool.get(id)) else {
                continue;
            };
            if record.exception.is_some() || record.inst.dest() != Some(reg) {
                continue;
            }
            return match station {
                Station::Wb => Operand::Value(record.result),
                Station::Mem if record.result_ready() => Operand::Bypass(record.result),
                _ => Operand::Stall,
            };
        }
        Operand::Value(self.regs.read(reg))
    }

    /// Whether an older record still has to write floating-point `reg`
    fn fp_pending(&self, reg: u8) -> bool {
        [Station::Ex, Station::Mem, Station::Wb]
            .into_iter()
            .filter_map(|s| self.latch(s).and_then(|id| self.pool.get(id)))
            .any(|r| r.exception.is_none() && r.inst.fp_dest() == Some(reg))
    }

    /// Read the operands of the record in ID; `false` means stall
    fn read_operands(&mut self, id: StageId) -> bool {
        let inst = self.pool[id].inst;
        if self.pool[id].exception.is_some() {
            self.pool[id].operands_read = true;
            return true;
        }

        let (rs, rt) = inst.sources();
        let hazard = [rs, rt]
            .into_iter()
            .flatten()
            .any(|reg| matches!(self.resolve(reg), Operand::Stall));
        let fp_hazard = inst.fp_source().is_some_and(|reg| self.fp_pending(reg));
        if hazard || fp_hazard {
            return false;
        }

        self.faults.inject_rf(self.regs.cells_mut(), &mut self.ctx);

        let op1 = rs.map(|reg| self.take_operand(reg)).unwrap_or_default();
        let op2 = rt.map(|reg| self.take_operand(reg)).unwrap_or_default();
        let fop = inst.fp_source().map(|reg| self.fpr.read(reg)).unwrap_or_default();

        let record = &mut self.pool[id];
        record.op1 = op1;
        record.op2 = op2;
        record.fop = fop;
        record.operands_read = true;
        true
    }

    fn take_operand(&mut self, reg: u8) -> FaultValue {
        match self.resolve(reg) {
            Operand::Value(value) => value,
            Operand::Bypass(mut value) => {
                self.faults.inject_mem_bp(&mut value, &mut self.ctx);
                value
            }
            Operand::Stall => FaultValue::default(),
        }
    }

    // ---------------------------------------------------------------- IF

    pub(super) fn fetch(&mut self) -> Result<()> {
        self.advance(Station::If);
        if self.latch(Station::If).is_some() {
            return Ok(());
        }

        self.faults.inject_pc(&mut self.pc, &mut self.ctx);
        let pc = self.pc;
        let mut address = pc;
        self.faults.inject_inst_addr(&mut address, &mut self.ctx);

        let fetch = address.data();
        let (encoding, exception) = if fetch & 3 != 0 {
            (Instruction::NOP, Some(ExceptionCause::AddressErrorLoad))
        } else {
            match self.text.fetch(fetch) {
                Some(word) => (word, None),
                None => (Instruction::NOP, Some(ExceptionCause::BusErrorInstruction)),
            }
        };

        let mut record = StageRecord::fetched(self.seq, pc.data(), address, encoding, self.cycle);
        record.exception = exception;
        let id = self.pool.alloc(record)?;
        self.latches[Station::If.index()] = Some(id);
        self.seq += 1;
        self.stats.fetched += 1;

        self.pc = FaultValue::compute([&pc], |[pc]| pc.wrapping_add(4));
        self.advance(Station::If);
        Ok(())
    }
}
