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

//! System-call emulation hook

use super::registers::RegisterFile;

/// What the pipeline does after a syscall retires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallAction {
    /// Keep running
    Continue,
    /// Stop with an exit code
    Exit(u32),
}

/// Services `syscall` instructions at writeback
///
/// The handler sees the architectural register file as of the syscall and
/// may update it (for example to return a value in v0).
pub trait SyscallHandler {
    fn syscall(&mut self, pc: u32, regs: &mut RegisterFile) -> SyscallAction;
}

/// Treat every syscall as program exit
///
/// The exit code is a0 for `exit2` (v0 = 17) and 0 otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct HaltOnSyscall;

impl HaltOnSyscall {
    pub const V0: u8 = 2;
    pub const A0: u8 = 4;
    pub const EXIT2: u32 = 17;
}

impl SyscallHandler for HaltOnSyscall {
    fn syscall(&mut self, pc: u32, regs: &mut RegisterFile) -> SyscallAction {
        let code = if regs.value(Self::V0) == Self::EXIT2 {
            regs.value(Self::A0)
        } else {
            0
        };
        log::info!(
            "syscall {} at 0x{:08x}: exit({})",
            regs.value(Self::V0),
            pc,
            code
        );
        SyscallAction::Exit(code)
    }
}
