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

use super::super::*;
use super::asm::*;
use super::{Harness, BASE};
use crate::core::memory::MemorySubsystem;

#[test]
fn test_overflow_is_precise() {
    let mut h = Harness::new(vec![
        lui(1, 0x7FFF),
        ori(1, 1, 0xFFFF),
        addi(2, 1, 1),
        addiu(3, 0, 9),
        syscall(),
    ]);
    assert_eq!(
        h.run(),
        RunOutcome::Exception {
            cause: ExceptionCause::Overflow,
            pc: BASE + 8
        }
    );
    // Older instructions completed, the faulting one and younger did not
    assert_eq!(h.cpu.reg(1), 0x7FFF_FFFF);
    assert_eq!(h.cpu.reg(2), 0);
    assert_eq!(h.cpu.reg(3), 0);
    assert_eq!(h.cpu.in_flight(), 0);
}

#[test]
fn test_add_overflow_on_register_operands() {
    let mut h = Harness::new(vec![add(3, 1, 2), syscall()]);
    h.cpu.set_reg(1, 0x8000_0000);
    h.cpu.set_reg(2, 0xFFFF_FFFF);
    assert!(matches!(
        h.run(),
        RunOutcome::Exception {
            cause: ExceptionCause::Overflow,
            ..
        }
    ));
}

#[test]
fn test_reserved_instruction() {
    let mut h = Harness::new(vec![0xFC00_0000, syscall()]);
    assert_eq!(
        h.run(),
        RunOutcome::Exception {
            cause: ExceptionCause::ReservedInstruction,
            pc: BASE
        }
    );
}

#[test]
fn test_break() {
    let mut h = Harness::new(vec![addiu(1, 0, 1), brk()]);
    assert_eq!(
        h.run(),
        RunOutcome::Exception {
            cause: ExceptionCause::Breakpoint,
            pc: BASE + 4
        }
    );
    assert_eq!(h.cpu.reg(1), 1);
}

#[test]
fn test_running_off_the_text_segment() {
    let mut h = Harness::new(vec![addiu(1, 0, 1)]);
    assert_eq!(
        h.run(),
        RunOutcome::Exception {
            cause: ExceptionCause::BusErrorInstruction,
            pc: BASE + 4
        }
    );
    assert_eq!(h.cpu.reg(1), 1);
}

#[test]
fn test_unaligned_store_never_reaches_memory() {
    let mut h = Harness::new(vec![addiu(1, 0, 0x55), sw(1, 0x202, 0), syscall()]);
    assert_eq!(
        h.run(),
        RunOutcome::Exception {
            cause: ExceptionCause::AddressErrorStore,
            pc: BASE + 4
        }
    );
    assert_eq!(h.mem.read_direct(0x200, 4), Some(0));
    assert_eq!(h.cpu.stats().total_mem_ops, 0);
}

#[test]
fn test_unaligned_load() {
    let mut h = Harness::new(vec![lw(1, 0x101, 0), syscall()]);
    assert!(matches!(
        h.run(),
        RunOutcome::Exception {
            cause: ExceptionCause::AddressErrorLoad,
            ..
        }
    ));
}

#[test]
fn test_store_behind_exception_is_not_issued() {
    let mut h = Harness::new(vec![addi(2, 1, 1), sw(1, 0x200, 0), syscall()]);
    h.cpu.set_reg(1, 0x7FFF_FFFF);
    h.run();
    assert_eq!(h.mem.read_direct(0x200, 4), Some(0));
    assert_eq!(h.cpu.stats().total_mem_ops, 0);
}

#[test]
fn test_store_behind_exit_is_not_issued() {
    let mut h = Harness::new(vec![syscall(), sw(1, 0x200, 0)]);
    h.cpu.set_reg(1, 0x1234);
    assert_eq!(h.run(), RunOutcome::Exited(0));
    assert_eq!(h.mem.read_direct(0x200, 4), Some(0));
}

/// Returns 99 in v0 on the first call and exits with 7 on the second
struct ReturnThenExit {
    calls: u32,
}

impl SyscallHandler for ReturnThenExit {
    fn syscall(&mut self, _pc: u32, regs: &mut RegisterFile) -> SyscallAction {
        self.calls += 1;
        if self.calls == 1 {
            regs.set(2, 99);
            SyscallAction::Continue
        } else {
            SyscallAction::Exit(7)
        }
    }
}

#[test]
fn test_syscall_handler_can_resume() {
    let mut h = Harness::new(vec![syscall(), addu(3, 2, 0), syscall()]);
    h.cpu
        .set_syscall_handler(Box::new(ReturnThenExit { calls: 0 }));
    assert_eq!(h.run(), RunOutcome::Exited(7));
    // Instructions after the syscall see the handler's v0
    assert_eq!(h.cpu.reg(3), 99);
}

#[test]
fn test_delay_slot_syscall_resumes_at_branch_target() {
    let mut h = Harness::new(vec![
        beq(0, 0, 2),
        syscall(),
        addiu(3, 0, 3),
        addiu(4, 0, 4),
        syscall(),
    ]);
    h.cpu
        .set_syscall_handler(Box::new(ReturnThenExit { calls: 0 }));
    assert_eq!(h.run(), RunOutcome::Exited(7));
    // The taken branch skips the first addiu
    assert_eq!(h.cpu.reg(3), 0);
    assert_eq!(h.cpu.reg(4), 4);
}

#[test]
fn test_delay_slot_syscall_falls_through_when_not_taken() {
    let mut h = Harness::new(vec![
        bne(0, 0, 2),
        syscall(),
        addiu(3, 0, 3),
        addiu(4, 0, 4),
        syscall(),
    ]);
    h.cpu
        .set_syscall_handler(Box::new(ReturnThenExit { calls: 0 }));
    assert_eq!(h.run(), RunOutcome::Exited(7));
    assert_eq!(h.cpu.reg(3), 3);
    assert_eq!(h.cpu.reg(4), 4);
}

#[test]
fn test_delay_slot_exception_reports_branch_address() {
    let mut h = Harness::new(vec![
        addiu(1, 0, 1),
        beq(0, 0, 2),
        brk(),
        addiu(3, 0, 3),
        syscall(),
    ]);
    assert_eq!(
        h.run(),
        RunOutcome::Exception {
            cause: ExceptionCause::Breakpoint,
            pc: BASE + 4
        }
    );
    assert_eq!(h.cpu.reg(1), 1);
    assert_eq!(h.cpu.reg(3), 0);
    assert_eq!(h.cpu.in_flight(), 0);
}
