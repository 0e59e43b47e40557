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

//! Multiply/divide unit
//!
//! A single, serially reusable unit. An operation occupies it for a fixed
//! number of cycles; HI and LO only change when the operation completes.
//! Anything that needs the unit (another multiply or divide, or a HI/LO
//! move) while it is busy stalls in EX.

use crate::core::value::FaultValue;

/// Operation started on the unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MduOp {
    Mult,
    Multu,
    Div,
    Divu,
}

impl MduOp {
    /// Cycles the unit stays busy
    pub fn latency(self) -> u64 {
        match self {
            MduOp::Mult | MduOp::Multu => MultiplyDivideUnit::MULT_LATENCY,
            MduOp::Div | MduOp::Divu => MultiplyDivideUnit::DIV_LATENCY,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    hi: FaultValue,
    lo: FaultValue,
    ready_at: u64,
}

/// HI/LO pair and the operation in flight
#[derive(Debug, Clone, Default)]
pub struct MultiplyDivideUnit {
    hi: FaultValue,
    lo: FaultValue,
    pending: Option<Pending>,
    operations: u64,
}

impl MultiplyDivideUnit {
    /// Multiply occupancy in cycles
    pub const MULT_LATENCY: u64 = 2;

    /// Divide occupancy in cycles
    pub const DIV_LATENCY: u64 = 12;

    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an operation is still running at `now`
    pub fn busy(&self, now: u64) -> bool {
        self.pending.is_some_and(|p| now < p.ready_at)
    }

    /// Start `op` on operands `a` (rs) and `b` (rt)
    ///
    /// The caller must check [`MultiplyDivideUnit::busy`] first.
    pub fn start(&mut self, op: MduOp, a: &FaultValue, b: &FaultValue, now: u64) {
        self.pending = Some(Pending {
            hi: FaultValue::compute([a, b], |[x, y]| Self::compute(op, x, y).0),
            lo: FaultValue::compute([a, b], |[x, y]| Self::compute(op, x, y).1),
            ready_at: now + op.latency(),
        });
        self.operations += 1;
    }

    /// Commit a finished operation to HI/LO
    ///
    /// Returns `true` when a result was committed this call.
    pub fn complete(&mut self, now: u64) -> bool {
        match self.pending {
            Some(p) if now >= p.ready_at => {
                self.hi = p.hi;
                self.lo = p.lo;
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    /// (HI, LO) result of an operation
    fn compute(op: MduOp, a: u32, b: u32) -> (u32, u32) {
        match op {
            MduOp::Mult => {
                let result = (a as i32 as i64) * (b as i32 as i64);
                ((result >> 32) as u32, result as u32)
            }
            MduOp::Multu => {
                let result = (a as u64) * (b as u64);
                ((result >> 32) as u32, result as u32)
            }
            MduOp::Div => {
                let numerator = a as i32;
                let denominator = b as i32;
                if denominator == 0 {
                    // No trap; result is unpredictable on MIPS32
                    (numerator as u32, if numerator >= 0 { 0xFFFF_FFFF } else { 1 })
                } else if a == 0x8000_0000 && denominator == -1 {
                    (0, 0x8000_0000)
                } else {
                    (
                        (numerator % denominator) as u32,
                        (numerator / denominator) as u32,
                    )
                }
            }
            MduOp::Divu => {
                if b == 0 {
                    (a, 0xFFFF_FFFF)
                } else {
                    (a % b, a / b)
                }
            }
        }
    }

    pub fn hi(&self) -> FaultValue {
        self.hi
    }

    pub fn lo(&self) -> FaultValue {
        self.lo
    }

    pub fn set_hi(&mut self, value: FaultValue) {
        self.hi = value;
    }

    pub fn set_lo(&mut self, value: FaultValue) {
        self.lo = value;
    }

    /// Both result registers, for the unit's fault point
    pub fn hi_lo_mut(&mut self) -> (&mut FaultValue, &mut FaultValue) {
        (&mut self.hi, &mut self.lo)
    }

    /// Operations started so far
    pub fn operations(&self) -> u64 {
        self.operations
    }
}
