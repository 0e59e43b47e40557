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

//! Reference memory backend
//!
//! A flat little-endian byte store. Accesses take effect in issue order;
//! only the response is delayed, by a per-request latency taken cyclically
//! from a pattern. A pattern such as `[3, 1]` makes consecutive requests
//! complete in reverse order.

use super::{MemOp, MemRequest, MemResponse, MemorySubsystem};
use crate::core::config::MemoryConfig;
use crate::core::error::{Result, SimError};

/// Response waiting for its completion cycle
#[derive(Debug, Clone)]
struct InFlight {
    due: u64,
    seq: u64,
    response: MemResponse,
}

/// Byte-addressed memory with configurable response latency
#[derive(Debug, Clone)]
pub struct LatencyMemory {
    base: u32,
    bytes: Vec<u8>,
    latencies: Vec<u64>,
    next_latency: usize,
    now: u64,
    seq: u64,
    in_flight: Vec<InFlight>,
    reads: u64,
    writes: u64,
}

impl LatencyMemory {
    /// Backend sized and timed by `config`
    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::with_latencies(config.base, config.size, config.latencies())
    }

    /// Backend of `size` bytes at `base` with a cyclic latency pattern
    pub fn with_latencies(base: u32, size: usize, latencies: Vec<u64>) -> Self {
        let latencies = if latencies.is_empty() {
            vec![1]
        } else {
            latencies
        };
        Self {
            base,
            bytes: vec![0; size],
            latencies,
            next_latency: 0,
            now: 0,
            seq: 0,
            in_flight: Vec::new(),
            reads: 0,
            writes: 0,
        }
    }

    /// Offset of `address..address + size` in the store, if it fits
    fn offset(&self, address: u32, size: usize) -> Option<usize> {
        let offset = address.checked_sub(self.base)? as usize;
        (offset.checked_add(size)? <= self.bytes.len()).then_some(offset)
    }

    fn next_latency(&mut self) -> u64 {
        let latency = self.latencies[self.next_latency];
        self.next_latency = (self.next_latency + 1) % self.latencies.len();
        latency
    }

    /// Reads served so far
    pub fn reads(&self) -> u64 {
        self.reads
    }

    /// Writes served so far
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl MemorySubsystem for LatencyMemory {
    fn send(&mut self, request: MemRequest) {
        let size = request.size as usize;
        let data = match request.op {
            MemOp::Read => {
                self.reads += 1;
                match self.offset(request.address, size) {
                    Some(off) => self.bytes[off..off + size].to_vec(),
                    None => {
                        log::warn!(
                            "Read of {} bytes outside memory at 0x{:08X}",
                            size,
                            request.address
                        );
                        vec![0; size]
                    }
                }
            }
            MemOp::Write => {
                self.writes += 1;
                match self.offset(request.address, request.data.len()) {
                    Some(off) => {
                        self.bytes[off..off + request.data.len()].copy_from_slice(&request.data);
                    }
                    None => {
                        log::warn!(
                            "Write of {} bytes outside memory at 0x{:08X} dropped",
                            size,
                            request.address
                        );
                    }
                }
                Vec::new()
            }
        };

        let due = self.now + self.next_latency();
        log::trace!(
            "Memory {:?} #{} 0x{:08X} due @ {}",
            request.op,
            request.id,
            request.address,
            due
        );
        self.in_flight.push(InFlight {
            due,
            seq: self.seq,
            response: MemResponse {
                id: request.id,
                data,
            },
        });
        self.seq += 1;
    }

    fn poll(&mut self, now: u64) -> Vec<MemResponse> {
        self.now = now;
        let (mut ready, waiting): (Vec<_>, Vec<_>) =
            self.in_flight.drain(..).partition(|r| r.due <= now);
        self.in_flight = waiting;
        ready.sort_by_key(|r| (r.due, r.seq));
        ready.into_iter().map(|r| r.response).collect()
    }

    fn init_data(&mut self, address: u32, bytes: &[u8]) -> Result<()> {
        let off = self
            .offset(address, bytes.len())
            .ok_or(SimError::ProgramOutOfRange { address })?;
        self.bytes[off..off + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn read_direct(&self, address: u32, size: u32) -> Option<u32> {
        let off = self.offset(address, size as usize)?;
        Some(super::bytes_to_u32(&self.bytes[off..off + size as usize]))
    }

    fn pending(&self) -> usize {
        self.in_flight.len()
    }
}
