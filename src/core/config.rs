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

//! Simulator configuration
//!
//! Configuration is read once at startup, from TOML or built in code, and is
//! never changed while a simulation runs.
//!
//! ```toml
//! timeout = 200000
//!
//! [fault]
//! locations = 0x40      # ALU
//! period = 1000
//! bits = 0              # random bit
//! seed = 7
//! script = "faults.txt"
//!
//! [memory]
//! latency = 3
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SimError};
use crate::core::fault::FaultLocations;

mod defaults {
    /// Legacy trigger window
    pub const FAULT_PERIOD: u64 = 100;

    /// Backing store size (16 MiB)
    pub const MEMORY_SIZE: usize = 16 * 1024 * 1024;

    /// Backing store base address
    pub const MEMORY_BASE: u32 = 0x0000_0000;

    /// Cycles from issue to response
    pub const MEMORY_LATENCY: u64 = 2;

    /// In-flight instruction slots
    pub const STAGE_POOL_CAPACITY: usize = 16;

    /// Default text segment address
    pub const TEXT_BASE: u32 = 0x0040_0000;
}

/// Fault injection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultConfig {
    /// Legacy location mask (see [`FaultLocations`] for the bit layout)
    #[serde(default)]
    pub locations: u32,

    /// Legacy triggers are drawn from `[0, period)`
    #[serde(default = "FaultConfig::default_period")]
    pub period: u64,

    /// Bits flipped by legacy faults (0 = one random bit)
    #[serde(default)]
    pub bits: u32,

    /// RNG seed (0 = taken from the wall clock)
    #[serde(default)]
    pub seed: u64,

    /// Match legacy triggers against the cycle instead of event counts
    #[serde(default)]
    pub by_time: bool,

    /// Fault script file
    #[serde(default)]
    pub script: Option<PathBuf>,

    /// Match MEM_POST legacy triggers against the MEM_PRE_ADDR event count
    #[serde(default)]
    pub mem_post_counts_pre_addr_events: bool,
}

impl FaultConfig {
    fn default_period() -> u64 {
        defaults::FAULT_PERIOD
    }

    /// Armed legacy locations
    pub fn locations(&self) -> FaultLocations {
        FaultLocations::from_bits_truncate(self.locations)
    }
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            locations: 0,
            period: defaults::FAULT_PERIOD,
            bits: 0,
            seed: 0,
            by_time: false,
            script: None,
            mem_post_counts_pre_addr_events: false,
        }
    }
}

/// Reference memory backend settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Backing store size in bytes
    #[serde(default = "MemoryConfig::default_size")]
    pub size: usize,

    /// Address of the first byte
    #[serde(default = "MemoryConfig::default_base")]
    pub base: u32,

    /// Cycles from issue to response
    #[serde(default = "MemoryConfig::default_latency")]
    pub latency: u64,

    /// Per-request latencies, applied cyclically (overrides `latency`)
    #[serde(default)]
    pub latency_pattern: Vec<u64>,
}

impl MemoryConfig {
    fn default_size() -> usize {
        defaults::MEMORY_SIZE
    }

    fn default_base() -> u32 {
        defaults::MEMORY_BASE
    }

    fn default_latency() -> u64 {
        defaults::MEMORY_LATENCY
    }

    /// Effective latency pattern
    pub fn latencies(&self) -> Vec<u64> {
        if self.latency_pattern.is_empty() {
            vec![self.latency]
        } else {
            self.latency_pattern.clone()
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            size: defaults::MEMORY_SIZE,
            base: defaults::MEMORY_BASE,
            latency: defaults::MEMORY_LATENCY,
            latency_pattern: Vec::new(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub fault: FaultConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    /// Raw half-cycle tick ceiling (None = unlimited)
    #[serde(default)]
    pub timeout: Option<u64>,

    /// Pipeline stage record slots
    #[serde(default = "SimConfig::default_stage_pool_capacity")]
    pub stage_pool_capacity: usize,

    /// Text segment address used by `Simulator::from_text`
    #[serde(default = "SimConfig::default_text_base")]
    pub text_base: u32,
}

impl SimConfig {
    fn default_stage_pool_capacity() -> usize {
        defaults::STAGE_POOL_CAPACITY
    }

    fn default_text_base() -> u32 {
        defaults::TEXT_BASE
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: SimConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Reject settings the simulator cannot run with
    pub fn validate(&self) -> Result<()> {
        if FaultLocations::from_bits(self.fault.locations).is_none() {
            return Err(SimError::Config(format!(
                "unknown fault location bits 0x{:x}",
                self.fault.locations & !FaultLocations::all().bits()
            )));
        }
        if self.fault.locations != 0 && self.fault.period == 0 {
            return Err(SimError::Config(
                "fault period must be non-zero when locations are armed".to_string(),
            ));
        }
        if self.memory.size == 0 {
            return Err(SimError::Config("memory size must be non-zero".to_string()));
        }
        // One record per station
        if self.stage_pool_capacity < 5 {
            return Err(SimError::Config(format!(
                "stage pool capacity {} is below the minimum of 5",
                self.stage_pool_capacity
            )));
        }
        if self.text_base & 3 != 0 {
            return Err(SimError::Config(format!(
                "text base 0x{:08x} is not word aligned",
                self.text_base
            )));
        }
        Ok(())
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fault: FaultConfig::default(),
            memory: MemoryConfig::default(),
            timeout: None,
            stage_pool_capacity: defaults::STAGE_POOL_CAPACITY,
            text_base: defaults::TEXT_BASE,
        }
    }
}
