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

//! MIPS 4Kc cycle-level simulator with transient fault injection
//!
//! This library models a five-station MIPS pipeline (IF/ID/EX/MEM/WB) that
//! talks to an asynchronous memory subsystem, and corrupts pipeline and
//! memory values according to randomized or scripted fault schedules so the
//! propagation of transient faults can be studied.
//!
//! # Example
//!
//! ```
//! use mips4kc::core::config::SimConfig;
//! use mips4kc::core::memory::LatencyMemory;
//! use mips4kc::core::system::{Program, Simulator};
//!
//! // addiu r2, r0, 10 ; syscall
//! let program = Program::new(0x0040_0000, vec![0x2402_000A, 0x0000_000C]);
//! let config = SimConfig::default();
//! let memory = LatencyMemory::from_config(&config.memory);
//!
//! let mut sim = Simulator::new(config, &program, memory).unwrap();
//! let outcome = sim.run().unwrap();
//! assert!(outcome.is_finished());
//! ```

pub mod core;
