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

//! System integration module
//!
//! Ties the pipeline to a memory backend and drives both from the
//! half-cycle clock until the program exits, raises an exception, or the
//! tick ceiling is reached.


use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::config::SimConfig;
use super::cpu::{Cpu, PipelineStats, RunOutcome, TextSegment};
use super::error::Result;
use super::fault::{FaultChecker, FaultStats};
use super::memory::{LatencyMemory, MemorySubsystem};
use super::timing::{ClockEdge, HalfCycleClock};
use super::value::FaultStatus;

/// In-memory program image
///
/// Text is fetched by the pipeline directly and is also copied to memory
/// so that loads from the text segment see it. Data segments are written
/// to memory and registered as the golden image before the first cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub text_base: u32,
    pub text: Vec<u32>,
    pub data: Vec<(u32, Vec<u8>)>,
    pub entry: u32,
}

impl Program {
    /// Text-only program entered at its first word
    pub fn new(text_base: u32, text: Vec<u32>) -> Self {
        Self {
            text_base,
            text,
            data: Vec::new(),
            entry: text_base,
        }
    }

    /// Add an initialized data segment
    pub fn with_data(mut self, address: u32, bytes: Vec<u8>) -> Self {
        self.data.push((address, bytes));
        self
    }

    pub fn with_entry(mut self, entry: u32) -> Self {
        self.entry = entry;
        self
    }

    fn text_bytes(&self) -> Vec<u8> {
        self.text.iter().flat_map(|w| w.to_le_bytes()).collect()
    }
}

/// End-of-run summary
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    pub outcome: RunOutcome,
    /// Pipeline cycles elapsed
    pub cycles: u64,
    /// Raw half-cycle ticks elapsed
    pub ticks: u64,
    pub pipeline: PipelineStats,
    pub faults: FaultStats,
    pub fault_status: BTreeMap<FaultStatus, u64>,
    pub faulty_memory_bytes: usize,
}

impl RunReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Pipeline plus memory backend
///
/// # Example
/// ```
/// use mips4kc::core::config::SimConfig;
/// use mips4kc::core::cpu::RunOutcome;
/// use mips4kc::core::memory::LatencyMemory;
/// use mips4kc::core::system::{Program, Simulator};
///
/// // addiu r2, r0, 17 ; addiu r4, r0, 3 ; syscall
/// let program = Program::new(0x0040_0000, vec![0x2402_0011, 0x2404_0003, 0x0000_000C]);
/// let config = SimConfig::default();
/// let memory = LatencyMemory::from_config(&config.memory);
///
/// let mut sim = Simulator::new(config, &program, memory).unwrap();
/// assert_eq!(sim.run().unwrap(), RunOutcome::Exited(3));
/// ```
pub struct Simulator<M: MemorySubsystem = LatencyMemory> {
    cpu: Cpu,
    memory: M,
    clock: HalfCycleClock,
    config: SimConfig,
    started: DateTime<Utc>,
}

impl<M: MemorySubsystem> Simulator<M> {
    /// Validate the configuration, build the fault checker and load the
    /// program image
    ///
    /// # Errors
    ///
    /// Invalid configuration, an unreadable or malformed fault script, or a
    /// program segment that does not fit in memory.
    pub fn new(config: SimConfig, program: &Program, mut memory: M) -> Result<Self> {
        config.validate()?;
        let faults = FaultChecker::new(&config.fault)?;

        let text = TextSegment::new(program.text_base, program.text.clone());
        let mut cpu = Cpu::new(text, program.entry, config.stage_pool_capacity, faults);

        let text_bytes = program.text_bytes();
        let segments = std::iter::once((program.text_base, &text_bytes))
            .chain(program.data.iter().map(|(addr, bytes)| (*addr, bytes)));
        for (address, bytes) in segments {
            memory.init_data(address, bytes)?;
            cpu.context_mut().init_orig_mem(address, bytes);
            log::debug!("Loaded {} bytes at 0x{:08x}", bytes.len(), address);
        }

        log::info!(
            "Simulator ready: entry 0x{:08x}, {} text words, {} data segments",
            program.entry,
            program.text.len(),
            program.data.len()
        );

        Ok(Self {
            cpu,
            memory,
            clock: HalfCycleClock::new(config.timeout),
            config,
            started: Utc::now(),
        })
    }

    /// Load a text-only program at the configured text base
    pub fn from_text(config: SimConfig, text: Vec<u32>, memory: M) -> Result<Self> {
        let program = Program::new(config.text_base, text);
        Self::new(config, &program, memory)
    }

    /// Advance one half-cycle
    ///
    /// # Errors
    ///
    /// Any fatal pipeline error (protocol violation, control-path fault,
    /// exhausted stage pool).
    pub fn tick(&mut self) -> Result<RunOutcome> {
        if self.cpu.outcome().is_finished() {
            return Ok(self.cpu.outcome());
        }
        let Some(tick) = self.clock.advance() else {
            self.cpu.time_out();
            return Ok(self.cpu.outcome());
        };
        match tick.edge {
            ClockEdge::Rising => self.cpu.rising_edge(tick.cycle, &mut self.memory)?,
            ClockEdge::Falling => self.cpu.falling_edge(tick.cycle, &mut self.memory)?,
        }
        Ok(self.cpu.outcome())
    }

    /// Tick until the run ends
    pub fn run(&mut self) -> Result<RunOutcome> {
        loop {
            let outcome = self.tick()?;
            if outcome.is_finished() {
                log::info!("Run finished at cycle {}: {:?}", self.clock.cycle(), outcome);
                return Ok(outcome);
            }
        }
    }

    /// Run at most `cycles` more pipeline cycles
    pub fn run_cycles(&mut self, cycles: u64) -> Result<RunOutcome> {
        for _ in 0..cycles.saturating_mul(2) {
            if self.tick()?.is_finished() {
                break;
            }
        }
        Ok(self.cpu.outcome())
    }

    pub fn report(&self) -> RunReport {
        let ctx = self.cpu.context();
        RunReport {
            started: self.started,
            finished: Utc::now(),
            outcome: self.cpu.outcome(),
            cycles: self.clock.cycle(),
            ticks: self.clock.ticks(),
            pipeline: self.cpu.stats(),
            faults: self.cpu.faults().stats(),
            fault_status: ctx.status_counts(),
            faulty_memory_bytes: ctx.faulty_bytes(),
        }
    }

    /// Dump every statistics table and return the report
    pub fn finish(&self) -> RunReport {
        self.cpu.faults().print_stats();
        self.cpu.context().print_stats();
        self.cpu.print_stats();
        self.report()
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Current pipeline cycle
    pub fn cycle(&self) -> u64 {
        self.clock.cycle()
    }
}
