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

/// Simulator error types
use std::path::PathBuf;

use thiserror::Error;

use crate::core::fault::FaultLocation;
use crate::core::memory::RequestId;

/// Result type for simulator operations
pub type Result<T> = std::result::Result<T, SimError>;

/// Main error type for the simulator
///
/// Every variant is fatal: the simulation cannot continue once one of these
/// has been returned.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Fault script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Memory protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("{location} fault injection is not supported")]
    UnsupportedFault { location: FaultLocation },

    #[error("Pipeline stage pool exhausted (capacity {capacity})")]
    StagePoolExhausted { capacity: usize },

    #[error("Program segment does not fit at 0x{address:08X}")]
    ProgramOutOfRange { address: u32 },
}

/// Fault script errors
///
/// All of these abort the run before the first cycle is simulated.
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("Cannot open fault file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid fault location (\"{name}\") line {line}")]
    UnknownLocation { line: usize, name: String },

    #[error("Invalid fault trigger (\"{trigger}\") line {line}")]
    InvalidTrigger { line: usize, trigger: String },

    #[error("Missing {field} field line {line}")]
    MissingField { line: usize, field: &'static str },

    #[error("Invalid number (\"{text}\") line {line}")]
    InvalidNumber { line: usize, text: String },

    #[error("Unexpected field (\"{text}\") line {line}")]
    UnexpectedField { line: usize, text: String },

    #[error("Cannot specify fault with no bits flipping, line {line}")]
    ZeroMask { line: usize },
}

/// Memory request/response correlation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("Request ID ({0}) not found in outstanding requests")]
    UnknownRequest(RequestId),

    #[error("Request ID ({0}) completed twice")]
    DuplicateResponse(RequestId),

    #[error("Request ID ({id}) polled by a stage that did not issue it")]
    WrongOwner { id: RequestId },
}
