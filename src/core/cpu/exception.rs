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

//! Exception causes
//!
//! Exceptions are precise: a cause is attached to the stage record that
//! raised it and only takes effect when that record reaches writeback.

use std::fmt;

use serde::Serialize;

/// Exception cause codes (the ExcCode field of the CAUSE register)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u32)]
pub enum ExceptionCause {
    /// Address error on load or instruction fetch
    AddressErrorLoad = 4,
    /// Address error on store
    AddressErrorStore = 5,
    /// Bus error on instruction fetch
    BusErrorInstruction = 6,
    /// Bus error on data access
    BusErrorData = 7,
    /// Syscall instruction executed
    Syscall = 8,
    /// Breakpoint instruction executed
    Breakpoint = 9,
    /// Reserved or illegal instruction
    ReservedInstruction = 10,
    /// Coprocessor unusable
    CoprocessorUnusable = 11,
    /// Arithmetic overflow
    Overflow = 12,
}

impl ExceptionCause {
    /// ExcCode value
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Conventional mnemonic
    pub fn mnemonic(self) -> &'static str {
        match self {
            ExceptionCause::AddressErrorLoad => "AdEL",
            ExceptionCause::AddressErrorStore => "AdES",
            ExceptionCause::BusErrorInstruction => "IBE",
            ExceptionCause::BusErrorData => "DBE",
            ExceptionCause::Syscall => "Sys",
            ExceptionCause::Breakpoint => "Bp",
            ExceptionCause::ReservedInstruction => "RI",
            ExceptionCause::CoprocessorUnusable => "CpU",
            ExceptionCause::Overflow => "Ov",
        }
    }
}

impl fmt::Display for ExceptionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.mnemonic(), self.code())
    }
}
