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

//! Shared fault bookkeeping
//!
//! One [`FaultContext`] exists per simulation. It carries the clock used to
//! timestamp faults, the fault-status table, and two address-keyed maps:
//! injected memory faults and the golden (fault-free) memory image.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::{FaultDesc, FaultValue};

/// What happened to a faulted value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FaultStatus {
    /// Bits flipped in place
    Injected,
    /// A register received a write meant for another one
    Redirected,
    /// A register missed a write that went elsewhere
    NotWritten,
    /// A faulted cell was overwritten by a clean value
    Masked,
    /// A faulted value or address reached memory
    StoredToMemory,
    /// A memory read disagreed with the golden image
    ReadMismatch,
}

impl FaultStatus {
    /// All statuses, in table order
    pub const ALL: [FaultStatus; 6] = [
        FaultStatus::Injected,
        FaultStatus::Redirected,
        FaultStatus::NotWritten,
        FaultStatus::Masked,
        FaultStatus::StoredToMemory,
        FaultStatus::ReadMismatch,
    ];

    #[inline(always)]
    fn index(self) -> usize {
        self as usize
    }
}

/// Fault recorded against one memory byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemFaultDesc {
    /// Originating fault
    pub fault: FaultDesc,
    /// Cycle of the store that carried it
    pub cycle: u64,
    /// The store itself went to a corrupted address
    pub misdirected: bool,
}

/// Simulation-wide fault state shared by every [`FaultValue`]
#[derive(Debug, Clone, Default)]
pub struct FaultContext {
    now: u64,
    status: [u64; FaultStatus::ALL.len()],
    mem_faults: HashMap<u32, MemFaultDesc>,
    orig_mem: HashMap<u32, u8>,
}

impl FaultContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cycle used for timestamps
    #[inline(always)]
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Advance the timestamp clock
    #[inline(always)]
    pub fn set_now(&mut self, cycle: u64) {
        self.now = cycle;
    }

    /// Count one occurrence of `status`
    pub fn record(&mut self, status: FaultStatus) {
        self.status[status.index()] += 1;
    }

    /// Occurrences of `status` so far
    pub fn count(&self, status: FaultStatus) -> u64 {
        self.status[status.index()]
    }

    /// Snapshot of the status table
    pub fn status_counts(&self) -> BTreeMap<FaultStatus, u64> {
        FaultStatus::ALL
            .into_iter()
            .map(|s| (s, self.count(s)))
            .collect()
    }

    /// Register initial memory contents as golden bytes
    pub fn init_orig_mem(&mut self, address: u32, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            self.orig_mem.insert(address.wrapping_add(i as u32), b);
        }
    }

    /// Golden little-endian value at `address`
    ///
    /// Returns `None` if any of the bytes was never written.
    pub fn golden_read(&self, address: u32, size: u32) -> Option<u32> {
        let mut value = 0u32;
        for i in (0..size).rev() {
            let byte = *self.orig_mem.get(&address.wrapping_add(i))?;
            value = (value << 8) | byte as u32;
        }
        Some(value)
    }

    /// Injected fault recorded against a memory byte
    pub fn memory_fault(&self, address: u32) -> Option<&MemFaultDesc> {
        self.mem_faults.get(&address)
    }

    /// Number of memory bytes currently carrying a fault
    pub fn faulty_bytes(&self) -> usize {
        self.mem_faults.len()
    }

    /// Track a store of `size` bytes
    ///
    /// The golden image is updated at the fault-free address with the
    /// fault-free value, while the fault map follows the address the store
    /// actually reached.
    pub fn record_store(&mut self, address: &FaultValue, value: &FaultValue, size: u32) {
        let actual = address.data();
        let golden_addr = address.golden();
        let golden_value = value.golden();

        for i in 0..size {
            let byte = (golden_value >> (8 * i)) as u8;
            self.orig_mem.insert(golden_addr.wrapping_add(i), byte);
        }

        let fault = if address.is_faulted() {
            address.fault().map(|f| (f, true))
        } else if value.is_faulted() {
            value.fault().map(|f| (f, false))
        } else {
            None
        };

        match fault {
            Some((fault, misdirected)) => {
                log::info!(
                    "Faulted store of {} bytes to 0x{:08x} ({})",
                    size,
                    actual,
                    fault
                );
                self.record(FaultStatus::StoredToMemory);
                let desc = MemFaultDesc {
                    fault,
                    cycle: self.now,
                    misdirected,
                };
                for i in 0..size {
                    self.mem_faults.insert(actual.wrapping_add(i), desc);
                }
            }
            None => {
                let mut masked = false;
                for i in 0..size {
                    masked |= self.mem_faults.remove(&actual.wrapping_add(i)).is_some();
                }
                if masked {
                    self.record(FaultStatus::Masked);
                }
            }
        }
    }

    /// Dump the fault-status table
    pub fn print_stats(&self) {
        log::info!("Fault status counts:");
        for status in FaultStatus::ALL {
            log::info!("  {:?}: {}", status, self.count(status));
        }
        log::info!("  Faulty memory bytes: {}", self.mem_faults.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fault::FaultLocation;

    fn desc(location: FaultLocation, bits: u32) -> FaultDesc {
        FaultDesc { location, bits }
    }

    #[test]
    fn test_golden_read_little_endian() {
        let mut ctx = FaultContext::new();
        ctx.init_orig_mem(0x1000, &[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(ctx.golden_read(0x1000, 4), Some(0x1234_5678));
        assert_eq!(ctx.golden_read(0x1002, 2), Some(0x1234));
        assert_eq!(ctx.golden_read(0x1003, 2), None);
    }

    #[test]
    fn test_clean_store_updates_golden() {
        let mut ctx = FaultContext::new();
        ctx.record_store(&FaultValue::new(0x2000), &FaultValue::new(0xCAFE_BABE), 4);
        assert_eq!(ctx.golden_read(0x2000, 4), Some(0xCAFE_BABE));
        assert_eq!(ctx.faulty_bytes(), 0);
        assert_eq!(ctx.count(FaultStatus::StoredToMemory), 0);
    }

    #[test]
    fn test_faulted_value_store_keeps_golden_value() {
        let mut ctx = FaultContext::new();
        let mut value = FaultValue::new(0x10);
        value.add_fault(desc(FaultLocation::MemPreData, 0x1), &mut ctx);
        ctx.record_store(&FaultValue::new(0x2000), &value, 1);

        assert_eq!(ctx.golden_read(0x2000, 1), Some(0x10));
        let mem = ctx.memory_fault(0x2000).unwrap();
        assert!(!mem.misdirected);
        assert_eq!(mem.fault.location, FaultLocation::MemPreData);
        assert_eq!(ctx.count(FaultStatus::StoredToMemory), 1);
    }

    #[test]
    fn test_store_of_derived_value_keeps_golden_value() {
        let mut ctx = FaultContext::new();
        let mut source = FaultValue::new(4);
        source.add_fault(desc(FaultLocation::Alu, 0x100), &mut ctx);
        let copy = FaultValue::compute([&source], |[x]| x);
        ctx.record_store(&FaultValue::new(0x2000), &copy, 4);

        assert_eq!(ctx.golden_read(0x2000, 4), Some(4));
        assert_eq!(ctx.memory_fault(0x2000).unwrap().fault.location, FaultLocation::Alu);
    }

    #[test]
    fn test_misdirected_store_tracks_actual_address() {
        let mut ctx = FaultContext::new();
        let mut addr = FaultValue::new(0x2000);
        addr.add_fault(desc(FaultLocation::MemPreAddr, 0x100), &mut ctx);
        ctx.record_store(&addr, &FaultValue::new(0xAB), 1);

        // Golden image follows the intended address
        assert_eq!(ctx.golden_read(0x2000, 1), Some(0xAB));
        assert_eq!(ctx.golden_read(0x2100, 1), None);
        assert!(ctx.memory_fault(0x2100).unwrap().misdirected);
    }

    #[test]
    fn test_clean_overwrite_masks_memory_fault() {
        let mut ctx = FaultContext::new();
        let mut value = FaultValue::new(0x10);
        value.add_fault(desc(FaultLocation::MemPreData, 0x1), &mut ctx);
        ctx.record_store(&FaultValue::new(0x3000), &value, 4);
        ctx.record_store(&FaultValue::new(0x3000), &FaultValue::new(7), 4);

        assert_eq!(ctx.faulty_bytes(), 0);
        assert_eq!(ctx.count(FaultStatus::Masked), 1);
    }

    #[test]
    fn test_status_counts_serialize() {
        let mut ctx = FaultContext::new();
        ctx.record(FaultStatus::Injected);
        ctx.record(FaultStatus::Injected);
        let json = serde_json::to_value(ctx.status_counts()).unwrap();
        assert_eq!(json["Injected"], 2);
        assert_eq!(json["ReadMismatch"], 0);
    }
}
