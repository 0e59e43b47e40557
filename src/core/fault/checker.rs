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

//! Fault checker
//!
//! The checker owns the per-location event counters, the random source and
//! the schedule sources. Pipeline stations call one `inject_*` operation per
//! injection point; each one asks [`FaultChecker::check_for_fault`] whether
//! the location fires and, if so, applies the fault to the value(s) it
//! guards.

use serde::Serialize;

use super::location::{FaultLocation, LOCATION_COUNT};
use super::rng::FaultRng;
use super::schedule::{FaultClock, FaultSource, LegacySchedule, ScriptSchedule};
use super::script::load_script;
use crate::core::config::FaultConfig;
use crate::core::error::{Result, SimError};
use crate::core::value::{FaultContext, FaultDesc, FaultStatus, FaultValue};

/// Number of architectural registers addressed by a writeback
pub const REGISTER_COUNT: usize = 32;

/// Per-location counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocationStats {
    pub location: FaultLocation,
    /// Times the location was checked
    pub events: u64,
    /// Times it fired
    pub fired: u64,
    /// Times more than one schedule source fired together
    pub merged: u64,
}

/// Snapshot of the checker's counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultStats {
    pub seed: u64,
    pub locations: Vec<LocationStats>,
}

impl FaultStats {
    /// Counters of one location
    pub fn get(&self, location: FaultLocation) -> Option<&LocationStats> {
        self.locations.iter().find(|s| s.location == location)
    }
}

/// Decides when and how faults are injected
pub struct FaultChecker {
    cycle: u64,
    events: [u64; LOCATION_COUNT],
    fired: [u64; LOCATION_COUNT],
    merged: [u64; LOCATION_COUNT],
    sources: Vec<Box<dyn FaultSource>>,
    rng: FaultRng,
}

impl FaultChecker {
    /// Seed the random source, draw the legacy triggers and load the script
    ///
    /// # Errors
    ///
    /// Returns an error if the fault script cannot be read or parsed.
    pub fn new(config: &FaultConfig) -> Result<Self> {
        let mut rng = if config.seed == 0 {
            FaultRng::from_clock()
        } else {
            FaultRng::new(config.seed)
        };
        log::info!("Fault Injector: seed {}", rng.seed());

        let mut legacy = LegacySchedule::new(
            config.locations(),
            config.period,
            config.bits,
            config.by_time,
            &mut rng,
        );
        legacy.set_mem_post_counts_pre_addr(config.mem_post_counts_pre_addr_events);

        let script = match &config.script {
            Some(path) => ScriptSchedule::from_entries(load_script(path)?),
            None => ScriptSchedule::default(),
        };

        Ok(Self::with_schedules(legacy, script, rng))
    }

    /// Checker over explicit schedules
    pub fn with_schedules(legacy: LegacySchedule, script: ScriptSchedule, rng: FaultRng) -> Self {
        Self {
            cycle: 0,
            events: [0; LOCATION_COUNT],
            fired: [0; LOCATION_COUNT],
            merged: [0; LOCATION_COUNT],
            sources: vec![Box::new(legacy), Box::new(script)],
            rng,
        }
    }

    /// Checker that never fires
    pub fn disabled() -> Self {
        Self::with_schedules(
            LegacySchedule::disabled(),
            ScriptSchedule::default(),
            FaultRng::new(1),
        )
    }

    /// Advance the cycle schedules are matched against
    #[inline(always)]
    pub fn set_cycle(&mut self, cycle: u64) {
        self.cycle = cycle;
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Times `location` has been checked
    pub fn event_count(&self, location: FaultLocation) -> u64 {
        self.events[location.index()]
    }

    /// Decide whether `location` faults now
    ///
    /// Always advances the location's event counter. Every source is
    /// consulted; when more than one fires their masks are OR-ed together.
    /// A returned mask of zero means "pick a random bit" (see
    /// [`FaultChecker::get_fault`]).
    pub fn check_for_fault(&mut self, location: FaultLocation) -> (bool, u32) {
        let idx = location.index();
        self.events[idx] += 1;

        let clock = FaultClock {
            cycle: self.cycle,
            events: &self.events,
        };

        let mut hits = 0;
        let mut bits = 0u32;
        for source in self.sources.iter_mut() {
            if let Some(mask) = source.check_location(location, &clock) {
                log::debug!("{} schedule fires {} (0x{:x})", source.name(), location, mask);
                hits += 1;
                bits |= mask;
            }
        }

        if hits > 1 {
            log::info!(
                "Legacy and scripted {} faults occur simultaneously. Combining faults (0x{:x}) @ {}",
                location,
                bits,
                self.cycle
            );
            self.merged[idx] += 1;
        }
        if hits > 0 {
            self.fired[idx] += 1;
        }
        (hits > 0, bits)
    }

    /// Final fault for a location: a random single bit when `bits` is zero
    pub fn get_fault(&mut self, location: FaultLocation, bits: u32) -> FaultDesc {
        let bits = if bits == 0 {
            1 << self.rng.bit_index()
        } else {
            bits
        };
        FaultDesc { location, bits }
    }

    fn fire(&mut self, location: FaultLocation) -> Option<FaultDesc> {
        let (fires, bits) = self.check_for_fault(location);
        if !fires {
            return None;
        }
        let fault = self.get_fault(location, bits);
        log::info!(
            "INJECTING {} fault (0x{:08x}) @ {}",
            location,
            fault.bits,
            self.cycle
        );
        Some(fault)
    }

    fn inject_value(
        &mut self,
        location: FaultLocation,
        value: &mut FaultValue,
        ctx: &mut FaultContext,
    ) -> bool {
        match self.fire(location) {
            Some(fault) => {
                let before = value.data();
                value.add_fault(fault, ctx);
                log::info!(
                    "  {}: 0x{:08x} -> 0x{:08x}",
                    location,
                    before,
                    value.data()
                );
                true
            }
            None => false,
        }
    }

    /// Register file: corrupt a random register in 1..=31
    pub fn inject_rf(
        &mut self,
        regs: &mut [FaultValue; REGISTER_COUNT],
        ctx: &mut FaultContext,
    ) -> bool {
        let Some(fault) = self.fire(FaultLocation::Rf) else {
            return false;
        };
        let reg = self.rng.reg_1_31() as usize;
        let before = regs[reg].data();
        regs[reg].add_fault(fault, ctx);
        log::info!(
            "  RF: r{} 0x{:08x} -> 0x{:08x}",
            reg,
            before,
            regs[reg].data()
        );
        true
    }

    /// Decode station; counted, never corrupts anything
    pub fn note_decode(&mut self) {
        let (fires, _) = self.check_for_fault(FaultLocation::Id);
        if fires {
            log::info!("ID fault fired @ {} (decode location is inert)", self.cycle);
        }
    }

    /// Multiply/divide result: one draw picks HI or LO
    pub fn inject_mdu(
        &mut self,
        hi: &mut FaultValue,
        lo: &mut FaultValue,
        ctx: &mut FaultContext,
    ) -> bool {
        let Some(fault) = self.fire(FaultLocation::Mdu) else {
            return false;
        };
        if self.rng.next_u32() & 1 == 0 {
            hi.add_fault(fault, ctx);
            log::info!("  MDU: HI -> 0x{:08x}", hi.data());
        } else {
            lo.add_fault(fault, ctx);
            log::info!("  MDU: LO -> 0x{:08x}", lo.data());
        }
        true
    }

    /// Memory operands before issue: address, then data
    ///
    /// Both locations are checked on every call. A data fault on a load
    /// corrupts an operand that is never used.
    pub fn inject_mem_pre(
        &mut self,
        address: &mut FaultValue,
        data: &mut FaultValue,
        is_load: bool,
        ctx: &mut FaultContext,
    ) -> bool {
        let addr_hit = self.inject_value(FaultLocation::MemPreAddr, address, ctx);
        let data_hit = self.inject_value(FaultLocation::MemPreData, data, ctx);
        if data_hit && is_load {
            log::info!("  MEM_PRE_DATA fault on a load has no architectural effect");
        }
        addr_hit || data_hit
    }

    /// Memory access result
    pub fn inject_mem_post(&mut self, value: &mut FaultValue, ctx: &mut FaultContext) -> bool {
        self.inject_value(FaultLocation::MemPost, value, ctx)
    }

    /// Writeback value
    pub fn inject_wb(&mut self, value: &mut FaultValue, ctx: &mut FaultContext) -> bool {
        self.inject_value(FaultLocation::Wb, value, ctx)
    }

    /// ALU result
    pub fn inject_alu(&mut self, value: &mut FaultValue, ctx: &mut FaultContext) -> bool {
        self.inject_value(FaultLocation::Alu, value, ctx)
    }

    /// Value forwarded on the MEM bypass
    pub fn inject_mem_bp(&mut self, value: &mut FaultValue, ctx: &mut FaultContext) -> bool {
        self.inject_value(FaultLocation::MemBp, value, ctx)
    }

    /// Instruction fetch address
    pub fn inject_inst_addr(&mut self, address: &mut FaultValue, ctx: &mut FaultContext) -> bool {
        self.inject_value(FaultLocation::InstAddr, address, ctx)
    }

    /// Program counter
    pub fn inject_pc(&mut self, pc: &mut FaultValue, ctx: &mut FaultContext) -> bool {
        self.inject_value(FaultLocation::Pc, pc, ctx)
    }

    /// Control path
    ///
    /// # Errors
    ///
    /// Control-path faults are not supported; firing ends the simulation.
    pub fn inject_control(&mut self) -> Result<()> {
        match self.fire(FaultLocation::Control) {
            Some(_) => Err(SimError::UnsupportedFault {
                location: FaultLocation::Control,
            }),
            None => Ok(()),
        }
    }

    /// Raw instruction encoding
    ///
    /// Flips bits of `encoding` in place; the caller re-decodes it.
    pub fn inject_inst_type(
        &mut self,
        encoding: &mut u32,
        ctx: &mut FaultContext,
    ) -> Option<FaultDesc> {
        let fault = self.fire(FaultLocation::InstType)?;
        *encoding ^= fault.bits;
        ctx.record(FaultStatus::Injected);
        Some(fault)
    }

    /// Register write through the writeback-address fault point
    ///
    /// Without a fault, `value` lands in `dest`. With one, the flipped bits
    /// (limited to the 5 index bits, one random index bit if none remain)
    /// are XOR-ed into `dest`: the resulting register receives the value
    /// unless it is r0, and `dest` is marked as having missed it.
    ///
    /// Returns the register actually written, if any.
    pub fn write_back_with_addr_fault(
        &mut self,
        regs: &mut [FaultValue; REGISTER_COUNT],
        dest: usize,
        value: FaultValue,
        ctx: &mut FaultContext,
    ) -> Option<usize> {
        let dest = dest & 0x1F;
        let Some(fault) = self.fire(FaultLocation::WbAddr) else {
            if dest == 0 {
                return None;
            }
            regs[dest].write(value, ctx);
            return Some(dest);
        };

        let mut mask = fault.bits & 0x1F;
        if mask == 0 {
            mask = 1 << self.rng.below(5);
        }
        let fault = FaultDesc {
            location: FaultLocation::WbAddr,
            bits: mask,
        };
        let actual = dest ^ mask as usize;
        log::info!("  WB_ADDR: r{} -> r{}", dest, actual);

        if actual != 0 {
            regs[actual].add_overwrite_fault(fault, &value, ctx);
        }
        if dest != 0 {
            regs[dest].note_not_written(fault, &value, ctx);
        }
        (actual != 0).then_some(actual)
    }

    /// Seed of the random source
    pub fn seed(&self) -> u64 {
        self.rng.seed()
    }

    pub fn stats(&self) -> FaultStats {
        FaultStats {
            seed: self.rng.seed(),
            locations: FaultLocation::ALL
                .into_iter()
                .map(|location| {
                    let i = location.index();
                    LocationStats {
                        location,
                        events: self.events[i],
                        fired: self.fired[i],
                        merged: self.merged[i],
                    }
                })
                .collect(),
        }
    }

    /// Dump the per-location event counters
    pub fn print_stats(&self) {
        log::info!("Fault location event counts (seed {}):", self.rng.seed());
        for location in FaultLocation::ALL {
            let i = location.index();
            log::info!(
                "  {:<12} events {:>10}  fired {:>4}  merged {:>4}",
                location,
                self.events[i],
                self.fired[i],
                self.merged[i]
            );
        }
    }
}
