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

//! General-purpose and floating-point register files

use crate::core::fault::REGISTER_COUNT;
use crate::core::value::{FaultContext, FaultValue};

/// 32 fault-aware registers with r0 hardwired to zero
#[derive(Debug, Clone)]
pub struct RegisterFile {
    regs: [FaultValue; REGISTER_COUNT],
}

impl RegisterFile {
    pub fn new() -> Self {
        Self {
            regs: [FaultValue::new(0); REGISTER_COUNT],
        }
    }

    /// Read a register (r0 always reads as a clean zero)
    #[inline(always)]
    pub fn read(&self, index: u8) -> FaultValue {
        if index == 0 {
            FaultValue::new(0)
        } else {
            self.regs[index as usize & 0x1F]
        }
    }

    /// Architectural value of a register
    #[inline(always)]
    pub fn value(&self, index: u8) -> u32 {
        self.read(index).data()
    }

    /// Write a register (writes to r0 are ignored)
    pub fn write(&mut self, index: u8, value: FaultValue, ctx: &mut FaultContext) {
        if index != 0 {
            self.regs[index as usize & 0x1F].write(value, ctx);
        }
    }

    /// Set a register without fault bookkeeping
    pub fn set(&mut self, index: u8, value: u32) {
        if index != 0 {
            self.regs[index as usize & 0x1F] = FaultValue::new(value);
        }
    }

    /// Raw cells, for fault points that pick or redirect the register
    pub fn cells_mut(&mut self) -> &mut [FaultValue; REGISTER_COUNT] {
        &mut self.regs
    }

    pub fn cells(&self) -> &[FaultValue; REGISTER_COUNT] {
        &self.regs
    }

    /// Registers currently holding a faulted value
    pub fn faulted(&self) -> impl Iterator<Item = u8> + '_ {
        self.regs
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_faulted())
            .map(|(i, _)| i as u8)
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Floating-point registers (values pass through unmodeled)
#[derive(Debug, Clone)]
pub struct FpRegisterFile {
    regs: [FaultValue; 32],
}

impl FpRegisterFile {
    pub fn new() -> Self {
        Self {
            regs: [FaultValue::new(0); 32],
        }
    }

    #[inline(always)]
    pub fn read(&self, index: u8) -> FaultValue {
        self.regs[index as usize & 0x1F]
    }

    pub fn write(&mut self, index: u8, value: FaultValue, ctx: &mut FaultContext) {
        self.regs[index as usize & 0x1F].write(value, ctx);
    }
}

impl Default for FpRegisterFile {
    fn default() -> Self {
        Self::new()
    }
}
