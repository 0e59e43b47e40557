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

//! Custom assertions for pipeline runs

use mips4kc::core::cpu::Cpu;
use mips4kc::core::fault::FaultLocation;
use mips4kc::core::system::RunReport;

/// Assert a general-purpose register has the expected value
#[allow(dead_code)]
pub fn assert_reg(cpu: &Cpu, reg: u8, expected: u32) {
    let actual = cpu.reg(reg);
    assert_eq!(
        actual, expected,
        "Register ${} mismatch: expected 0x{:08X}, got 0x{:08X}",
        reg, expected, actual
    );
}

/// Assert a location fired exactly `expected` times
#[allow(dead_code)]
pub fn assert_fired(report: &RunReport, location: FaultLocation, expected: u64) {
    let fired = report.faults.get(location).map_or(0, |s| s.fired);
    assert_eq!(
        fired, expected,
        "{} fired {} times, expected {}",
        location, fired, expected
    );
}

/// Assert the pipeline drained completely
#[allow(dead_code)]
pub fn assert_drained(cpu: &Cpu) {
    assert_eq!(cpu.in_flight(), 0, "stage records still in flight");
    assert_eq!(cpu.pool().in_use(), 0, "stage pool slots still allocated");
}
