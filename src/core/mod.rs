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

//! Core simulation components
//!
//! This module contains all simulator components:
//! - Fault injection (schedules, checker, statistics)
//! - Fault-aware values and the shared fault context
//! - CPU pipeline (MIPS 4Kc, five stations)
//! - Memory subsystem interface and request correlation
//! - Half-cycle clock and system integration

pub mod config;
pub mod cpu;
pub mod error;
pub mod fault;
pub mod memory;
pub mod system;
pub mod timing;
pub mod value;

// Re-export commonly used types
pub use config::SimConfig;
pub use cpu::{Cpu, RunOutcome};
pub use error::{ProtocolViolation, Result, ScriptError, SimError};
pub use fault::{FaultChecker, FaultLocation};
pub use memory::{Correlator, LatencyMemory, MemorySubsystem};
pub use system::{Program, Simulator};
pub use value::{FaultContext, FaultValue};
