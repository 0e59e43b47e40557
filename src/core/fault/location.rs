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

//! Fault locations
//!
//! A fault location names one point in the pipeline where a bit flip may be
//! injected. The set is closed; the ordering below is only used for indexing
//! per-location tables.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Pipeline point where a fault may be injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultLocation {
    /// Register file, read before EX
    Rf,
    /// Decode station (counted only)
    Id,
    /// Multiply/divide unit result (HI or LO)
    Mdu,
    /// Memory operand address, before translation
    MemPreAddr,
    /// Memory access result, after completion
    MemPost,
    /// Writeback value
    Wb,
    /// ALU result
    Alu,
    /// Value on the MEM bypass path
    MemBp,
    /// Control path (not supported)
    Control,
    /// Instruction fetch address
    InstAddr,
    /// Raw instruction encoding
    InstType,
    /// Writeback destination register index
    WbAddr,
    /// Memory data operand, before translation
    MemPreData,
    /// Program counter
    Pc,
}

/// Number of fault locations
pub const LOCATION_COUNT: usize = 14;

bitflags! {
    /// Set of locations armed for legacy (randomly scheduled) faults
    ///
    /// The bit layout matches the `fault_locations` configuration mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FaultLocations: u32 {
        const RF = 0x0001;
        const ID = 0x0002;
        const MDU = 0x0004;
        const MEM_PRE_ADDR = 0x0008;
        const MEM_POST = 0x0010;
        const WB = 0x0020;
        const ALU = 0x0040;
        const MEM_BP = 0x0080;
        const CONTROL = 0x0100;
        const INST_ADDR = 0x0200;
        const INST_TYPE = 0x0400;
        const WB_ADDR = 0x0800;
        const MEM_PRE_DATA = 0x1000;
        const PC = 0x2000;
    }
}

impl FaultLocation {
    /// All locations, in table order
    pub const ALL: [FaultLocation; LOCATION_COUNT] = [
        FaultLocation::Rf,
        FaultLocation::Id,
        FaultLocation::Mdu,
        FaultLocation::MemPreAddr,
        FaultLocation::MemPost,
        FaultLocation::Wb,
        FaultLocation::Alu,
        FaultLocation::MemBp,
        FaultLocation::Control,
        FaultLocation::InstAddr,
        FaultLocation::InstType,
        FaultLocation::WbAddr,
        FaultLocation::MemPreData,
        FaultLocation::Pc,
    ];

    /// Index into per-location tables
    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Tag used in fault scripts and diagnostics
    pub fn name(self) -> &'static str {
        match self {
            FaultLocation::Rf => "RF",
            FaultLocation::Id => "ID",
            FaultLocation::Mdu => "MDU",
            FaultLocation::MemPreAddr => "MEM_PRE_ADDR",
            FaultLocation::MemPost => "MEM_POST",
            FaultLocation::Wb => "WB",
            FaultLocation::Alu => "ALU",
            FaultLocation::MemBp => "MEM_BP",
            FaultLocation::Control => "CONTROL",
            FaultLocation::InstAddr => "INST_ADDR",
            FaultLocation::InstType => "INST_TYPE",
            FaultLocation::WbAddr => "WB_ADDR",
            FaultLocation::MemPreData => "MEM_PRE_DATA",
            FaultLocation::Pc => "PC",
        }
    }

    /// Legacy configuration flag for this location
    pub fn flag(self) -> FaultLocations {
        FaultLocations::from_bits_truncate(1 << self.index())
    }
}

impl fmt::Display for FaultLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned for an unrecognized location tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLocation(pub String);

impl FromStr for FaultLocation {
    type Err = UnknownLocation;

    /// Parse a script tag. Matching is exact and case-sensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FaultLocation::ALL
            .into_iter()
            .find(|loc| loc.name() == s)
            .ok_or_else(|| UnknownLocation(s.to_string()))
    }
}

impl FaultLocations {
    /// Iterate the armed locations in table order
    pub fn locations(self) -> impl Iterator<Item = FaultLocation> {
        FaultLocation::ALL
            .into_iter()
            .filter(move |loc| self.contains(loc.flag()))
    }
}
