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

//! Memory subsystem interface
//!
//! The pipeline talks to memory through an asynchronous request/response
//! exchange. A request is sent during a rising half-cycle; its response may
//! arrive at any later half-cycle, in any order relative to other requests.
//!
//! - [`MemorySubsystem`]: what a backend must provide
//! - [`Correlator`]: attributes responses to the stage record that issued them
//! - [`LatencyMemory`]: reference backend with a configurable latency pattern
//!
//! # Example
//!
//! ```
//! use mips4kc::core::memory::{LatencyMemory, MemOp, MemRequest, MemorySubsystem, RequestId};
//!
//! let mut mem = LatencyMemory::with_latencies(0, 0x1000, vec![2]);
//! mem.init_data(0x100, &[0x78, 0x56, 0x34, 0x12]).unwrap();
//!
//! mem.poll(0);
//! mem.send(MemRequest::read(RequestId(1), 0x100, 4));
//! assert!(mem.poll(1).is_empty());
//!
//! let responses = mem.poll(2);
//! assert_eq!(responses[0].id, RequestId(1));
//! assert_eq!(responses[0].value(), 0x1234_5678);
//! ```

mod correlator;
mod latency;

#[cfg(test)]
mod tests;

use std::fmt;

use serde::Serialize;

use crate::core::error::Result;

pub use correlator::{Correlator, RequestState};
pub use latency::LatencyMemory;

/// Identifier correlating a request with its response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Memory operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MemOp {
    Read,
    Write,
}

/// Request sent to the memory subsystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemRequest {
    pub id: RequestId,
    pub op: MemOp,
    pub address: u32,
    /// Access size in bytes (1, 2 or 4)
    pub size: u32,
    /// Little-endian store data (empty for reads)
    pub data: Vec<u8>,
}

impl MemRequest {
    /// Read of `size` bytes
    pub fn read(id: RequestId, address: u32, size: u32) -> Self {
        Self {
            id,
            op: MemOp::Read,
            address,
            size,
            data: Vec::new(),
        }
    }

    /// Write of the low `size` bytes of `value`
    pub fn write(id: RequestId, address: u32, size: u32, value: u32) -> Self {
        let data = value.to_le_bytes()[..size as usize].to_vec();
        Self {
            id,
            op: MemOp::Write,
            address,
            size,
            data,
        }
    }
}

/// Response delivered by the memory subsystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemResponse {
    pub id: RequestId,
    /// Little-endian payload (read data, or empty for a write ack)
    pub data: Vec<u8>,
}

impl MemResponse {
    /// Payload as a zero-extended little-endian value
    pub fn value(&self) -> u32 {
        bytes_to_u32(&self.data)
    }
}

/// Zero-extended little-endian value of up to 4 bytes
pub fn bytes_to_u32(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .rev()
        .fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

/// Asynchronous memory backend
///
/// Responses for distinct requests may be delivered in any order.
pub trait MemorySubsystem {
    /// Accept a request; its response arrives through a later `poll`
    fn send(&mut self, request: MemRequest);

    /// Advance to `now` (pipeline cycle) and collect completed responses
    fn poll(&mut self, now: u64) -> Vec<MemResponse>;

    /// Write initial contents without going through the request path
    fn init_data(&mut self, address: u32, bytes: &[u8]) -> Result<()>;

    /// Read current contents without going through the request path
    fn read_direct(&self, address: u32, size: u32) -> Option<u32>;

    /// Requests accepted but not yet answered
    fn pending(&self) -> usize;
}
