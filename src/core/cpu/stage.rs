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

//! Pipeline stage records and their arena
//!
//! Every instruction in flight owns one [`StageRecord`], allocated at fetch
//! and released when it retires or is squashed. Records live in a
//! fixed-capacity [`StagePool`] and are named by a generation-checked
//! [`StageId`], so an id held by the memory correlator can never alias a
//! record that was freed and reallocated.

use std::fmt;
use std::ops::{Index, IndexMut};

use serde::Serialize;

use super::exception::ExceptionCause;
use super::instruction::{Instruction, Op, Unit};
use crate::core::error::{Result, SimError};
use crate::core::memory::RequestId;
use crate::core::value::{FaultDesc, FaultValue};

/// Pipeline station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Station {
    If,
    Id,
    Ex,
    Mem,
    Wb,
}

impl Station {
    pub const ALL: [Station; 5] = [
        Station::If,
        Station::Id,
        Station::Ex,
        Station::Mem,
        Station::Wb,
    ];

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Station a record moves to next
    pub fn next(self) -> Option<Station> {
        match self {
            Station::If => Some(Station::Id),
            Station::Id => Some(Station::Ex),
            Station::Ex => Some(Station::Mem),
            Station::Mem => Some(Station::Wb),
            Station::Wb => None,
        }
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Station::If => "IF",
            Station::Id => "ID",
            Station::Ex => "EX",
            Station::Mem => "MEM",
            Station::Wb => "WB",
        };
        f.write_str(name)
    }
}

/// Progress of a record through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Fetched,
    Decoded,
    Executing(Unit),
    MemoryIssued,
    MemoryComplete,
    WrittenBack,
}

/// Per-instruction bookkeeping
#[derive(Debug, Clone)]
pub struct StageRecord {
    /// Fetch order
    pub seq: u64,
    /// Architectural address of the instruction
    pub pc: u32,
    /// Address actually fetched from (differs from `pc` under an INST_ADDR fault)
    pub fetch_addr: FaultValue,
    pub encoding: u32,
    pub inst: Instruction,
    pub station: Station,
    pub state: StageState,

    /// Operands read in decode (rs, rt)
    pub op1: FaultValue,
    pub op2: FaultValue,
    /// Floating-point operand (MFC1)
    pub fop: FaultValue,
    pub operands_read: bool,

    /// Effective address computed in EX
    pub addr: FaultValue,
    /// Address the request was sent to
    pub paddr: u32,
    /// Store data operand
    pub store_data: FaultValue,
    /// Value written back (ALU result, loaded value, link address)
    pub result: FaultValue,
    pub executed: bool,

    /// Memory request already sent
    pub sent: bool,
    pub request: Option<RequestId>,

    /// Sits in the delay slot of a branch or jump
    pub dslot: bool,
    /// Where execution continues after a delay slot whose branch was taken
    pub branch_target: Option<u32>,
    pub exception: Option<ExceptionCause>,
    /// INST_TYPE fault applied to the encoding
    pub inst_fault: Option<FaultDesc>,

    pub fetched_at: u64,
    pub stall_cycles: u64,
    pub cycles: u64,
}

impl StageRecord {
    /// Record for a freshly fetched encoding
    pub fn fetched(seq: u64, pc: u32, fetch_addr: FaultValue, encoding: u32, now: u64) -> Self {
        Self {
            seq,
            pc,
            fetch_addr,
            encoding,
            inst: Instruction::decode(Instruction::NOP),
            station: Station::If,
            state: StageState::Fetched,
            op1: FaultValue::default(),
            op2: FaultValue::default(),
            fop: FaultValue::default(),
            operands_read: false,
            addr: FaultValue::default(),
            paddr: 0,
            store_data: FaultValue::default(),
            result: FaultValue::default(),
            executed: false,
            sent: false,
            request: None,
            dslot: false,
            branch_target: None,
            exception: None,
            inst_fault: None,
            fetched_at: now,
            stall_cycles: 0,
            cycles: 0,
        }
    }

    /// Whether the instruction goes to memory
    pub fn is_memory_op(&self) -> bool {
        self.inst.access_size().is_some() && self.exception.is_none()
    }

    /// Whether `result` holds the final value for forwarding
    pub fn result_ready(&self) -> bool {
        if !self.executed {
            return false;
        }
        !self.inst.is_load() || self.state == StageState::MemoryComplete
    }

    /// Address the program continues from once this instruction completes
    pub fn resume_pc(&self) -> u32 {
        self.branch_target.unwrap_or(self.pc.wrapping_add(4))
    }

    /// Restart address reported for an exception: the branch for a delay slot
    pub fn exception_pc(&self) -> u32 {
        if self.dslot {
            self.pc.wrapping_sub(4)
        } else {
            self.pc
        }
    }

    /// Syscall or break: stops memory issue behind it
    pub fn is_serializing(&self) -> bool {
        self.exception.is_some() || matches!(self.inst.op, Op::Syscall | Op::Break)
    }
}

/// Handle to a pooled record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId {
    index: u32,
    generation: u32,
}

impl StageId {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    record: Option<StageRecord>,
}

/// Fixed-capacity arena of stage records with O(1) alloc/free
#[derive(Debug, Clone)]
pub struct StagePool {
    slots: Vec<Slot>,
    free: Vec<u32>,
    high_water: usize,
}

impl StagePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity)
                .map(|_| Slot {
                    generation: 0,
                    record: None,
                })
                .collect(),
            // Lowest index is handed out first
            free: (0..capacity as u32).rev().collect(),
            high_water: 0,
        }
    }

    /// Take a free slot for `record`
    ///
    /// # Errors
    ///
    /// `StagePoolExhausted` when every slot is in use.
    pub fn alloc(&mut self, record: StageRecord) -> Result<StageId> {
        let index = self.free.pop().ok_or(SimError::StagePoolExhausted {
            capacity: self.slots.len(),
        })?;
        let slot = &mut self.slots[index as usize];
        slot.record = Some(record);
        let generation = slot.generation;
        self.high_water = self.high_water.max(self.in_use());
        Ok(StageId { index, generation })
    }

    /// Release `id`, returning its record
    ///
    /// Stale ids are ignored and return `None`.
    pub fn free(&mut self, id: StageId) -> Option<StageRecord> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation {
            return None;
        }
        let record = slot.record.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(record)
    }

    pub fn get(&self, id: StageId) -> Option<&StageRecord> {
        self.slots
            .get(id.index())
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.record.as_ref())
    }

    pub fn get_mut(&mut self, id: StageId) -> Option<&mut StageRecord> {
        self.slots
            .get_mut(id.index())
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.record.as_mut())
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Records currently allocated
    pub fn in_use(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Most records ever allocated at once
    pub fn high_water(&self) -> usize {
        self.high_water
    }
}

/// Panics on a stale id
impl Index<StageId> for StagePool {
    type Output = StageRecord;

    fn index(&self, id: StageId) -> &StageRecord {
        match self.get(id) {
            Some(record) => record,
            None => panic!("stale stage id {}", id),
        }
    }
}

impl IndexMut<StageId> for StagePool {
    fn index_mut(&mut self, id: StageId) -> &mut StageRecord {
        match self.get_mut(id) {
            Some(record) => record,
            None => panic!("stale stage id {}", id),
        }
    }
}
