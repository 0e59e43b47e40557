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

//! Fault-aware values
//!
//! A [`FaultValue`] is a 32-bit architectural value that also remembers
//! whether a fault touched it, which bits were flipped and when, and whether
//! a corrupted register write was redirected to or away from it.
//!
//! Values produced from faulted inputs stay faulted ([`FaultValue::derive`]),
//! so corruption can be followed from its injection point into registers and
//! memory.

mod context;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::fault::FaultLocation;

pub use context::{FaultContext, FaultStatus, MemFaultDesc};

/// A fault decision: where it happened and which bits flip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FaultDesc {
    pub location: FaultLocation,
    pub bits: u32,
}

impl fmt::Display for FaultDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} 0x{:08x}", self.location, self.bits)
    }
}

/// Register-write redirection caused by a writeback-address fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirect {
    /// This cell received `value`, which was meant for another register
    Overwritten { fault: FaultDesc, value: u32 },
    /// This cell should have received `value` but did not
    NotWritten { fault: FaultDesc, value: u32 },
}

/// A 32-bit value carrying fault provenance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultValue {
    data: u32,
    faulted: bool,
    /// Bits flipped directly in this cell
    flipped: u32,
    /// What the cell would hold had no fault happened
    golden: u32,
    fault: Option<FaultDesc>,
    cycle: u64,
    redirect: Option<Redirect>,
}

impl FaultValue {
    /// Clean value
    pub const fn new(data: u32) -> Self {
        Self {
            data,
            faulted: false,
            flipped: 0,
            golden: data,
            fault: None,
            cycle: 0,
            redirect: None,
        }
    }

    /// Value `data` produced from `sources`
    ///
    /// The result is faulted if any source is, and inherits the provenance
    /// of the first faulted source. Its fault-free counterpart is `data`
    /// itself; use [`FaultValue::compute`] or [`FaultValue::with_golden`]
    /// when the sources' own fault-free values lead elsewhere.
    pub fn derive(data: u32, sources: &[&FaultValue]) -> Self {
        let mut value = Self::new(data);
        if let Some(src) = sources.iter().find(|s| s.faulted) {
            value.faulted = true;
            value.fault = src.fault;
            value.cycle = src.cycle;
        }
        value
    }

    /// Apply `f` to the sources' values and, separately, to their
    /// fault-free values
    ///
    /// ```
    /// use mips4kc::core::fault::FaultLocation;
    /// use mips4kc::core::value::{FaultContext, FaultDesc, FaultValue};
    ///
    /// let mut ctx = FaultContext::new();
    /// let mut a = FaultValue::new(4);
    /// a.add_fault(FaultDesc { location: FaultLocation::Alu, bits: 0x100 }, &mut ctx);
    ///
    /// let sum = FaultValue::compute([&a, &FaultValue::new(1)], |[x, y]| x + y);
    /// assert_eq!(sum.data(), 0x105);
    /// assert_eq!(sum.golden(), 5);
    /// ```
    pub fn compute<const N: usize>(
        sources: [&FaultValue; N],
        f: impl Fn([u32; N]) -> u32,
    ) -> Self {
        let data = f(sources.map(|s| s.data));
        let golden = f(sources.map(|s| s.golden));
        Self::derive(data, &sources).with_golden(golden)
    }

    /// Override the fault-free counterpart
    pub fn with_golden(mut self, golden: u32) -> Self {
        self.golden = golden;
        self
    }

    #[inline(always)]
    pub fn data(&self) -> u32 {
        self.data
    }

    #[inline(always)]
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Bits flipped directly in this cell
    pub fn flipped_bits(&self) -> u32 {
        self.flipped
    }

    /// Fault-free value, as far as this cell knows
    pub fn golden(&self) -> u32 {
        self.golden
    }

    pub fn fault(&self) -> Option<FaultDesc> {
        self.fault
    }

    /// Cycle the fault was applied
    pub fn fault_cycle(&self) -> u64 {
        self.cycle
    }

    pub fn redirect(&self) -> Option<Redirect> {
        self.redirect
    }

    /// Flip `fault.bits` in place
    pub fn add_fault(&mut self, fault: FaultDesc, ctx: &mut FaultContext) {
        self.data ^= fault.bits;
        self.flipped ^= fault.bits;
        self.faulted = true;
        self.fault = Some(fault);
        self.cycle = ctx.now();
        ctx.record(FaultStatus::Injected);
    }

    /// This cell unexpectedly received a write meant for another register
    pub fn add_overwrite_fault(
        &mut self,
        fault: FaultDesc,
        value: &FaultValue,
        ctx: &mut FaultContext,
    ) {
        self.data = value.data;
        self.flipped = 0;
        self.faulted = true;
        self.fault = Some(fault);
        self.cycle = ctx.now();
        self.redirect = Some(Redirect::Overwritten {
            fault,
            value: value.data,
        });
        ctx.record(FaultStatus::Redirected);
    }

    /// This cell missed a write of `value` that was redirected elsewhere
    pub fn note_not_written(
        &mut self,
        fault: FaultDesc,
        value: &FaultValue,
        ctx: &mut FaultContext,
    ) {
        self.golden = value.golden;
        self.faulted = true;
        self.fault = Some(fault);
        self.cycle = ctx.now();
        self.redirect = Some(Redirect::NotWritten {
            fault,
            value: value.data,
        });
        ctx.record(FaultStatus::NotWritten);
    }

    /// Architectural write of `new` into this cell
    ///
    /// Overwriting a faulted cell with a clean value masks the fault.
    pub fn write(&mut self, new: FaultValue, ctx: &mut FaultContext) {
        if self.faulted && !new.faulted {
            log::debug!(
                "Fault masked by overwrite (0x{:08x} -> 0x{:08x})",
                self.data,
                new.data
            );
            ctx.record(FaultStatus::Masked);
        }
        *self = new;
    }

    /// Reconcile this cell with the value memory actually returned
    ///
    /// `self` holds what the pipeline expects at `address` (the golden
    /// image). A mismatch with `external` is logged, counted, and the cell
    /// adopts the external value; memory is authoritative. Faults recorded
    /// against the bytes read are inherited either way.
    ///
    /// Returns `true` on mismatch.
    pub fn check_read_for_faults(
        &mut self,
        address: u32,
        external: u32,
        size: u32,
        ctx: &mut FaultContext,
    ) -> bool {
        let mask = match size {
            1 => 0xFF,
            2 => 0xFFFF,
            _ => 0xFFFF_FFFF,
        };
        let expected = self.data & mask;
        let actual = external & mask;
        let mismatch = expected != actual;

        if mismatch {
            log::warn!(
                "Read mismatch at 0x{:08x}: expected 0x{:08x}, memory has 0x{:08x} @ {}",
                address,
                expected,
                actual,
                ctx.now()
            );
            ctx.record(FaultStatus::ReadMismatch);
        }

        let inherited = (0..size).find_map(|i| ctx.memory_fault(address.wrapping_add(i)).copied());

        self.data = actual;
        self.golden = expected;
        self.flipped = 0;
        self.redirect = None;
        match inherited {
            Some(mem) => {
                self.faulted = true;
                self.fault = Some(mem.fault);
                self.cycle = mem.cycle;
            }
            None if mismatch => {
                self.faulted = true;
            }
            None => {}
        }
        mismatch
    }
}

impl From<u32> for FaultValue {
    fn from(data: u32) -> Self {
        Self::new(data)
    }
}

impl fmt::Display for FaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.data)?;
        if let Some(fault) = self.fault.filter(|_| self.faulted) {
            write!(f, " [{} @ {}]", fault, self.cycle)?;
        }
        Ok(())
    }
}
