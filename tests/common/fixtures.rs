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

//! Test fixtures: programs and simulator builders

use std::io::Write;

use mips4kc::core::config::SimConfig;
use mips4kc::core::memory::LatencyMemory;
use mips4kc::core::system::{Program, Simulator};
use tempfile::NamedTempFile;

pub const TEXT_BASE: u32 = 0x0040_0000;
pub const ARRAY_BASE: u32 = 0x1000;

/// Initialize logging once per test binary
#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Sum five words at `ARRAY_BASE` and exit with the total in a0
///
/// ```text
///       addiu r5, r0, 0x1000
///       addiu r6, r0, 5
///       addu  r4, r0, r0
/// loop: lw    r7, 0(r5)
///       addiu r6, r6, -1
///       addu  r4, r4, r7
///       bne   r6, r0, loop
///       addiu r5, r5, 4
///       addiu r2, r0, 17
///       syscall
/// ```
#[allow(dead_code)]
pub fn array_sum(values: [u32; 5]) -> Program {
    let text = vec![
        0x2405_1000,
        0x2406_0005,
        0x0000_2021,
        0x8CA7_0000,
        0x24C6_FFFF,
        0x0087_2021,
        0x14C0_FFFC,
        0x24A5_0004,
        0x2402_0011,
        0x0000_000C,
    ];
    let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    Program::new(TEXT_BASE, text).with_data(ARRAY_BASE, data)
}

/// `addiu r2, r0, 17 ; addiu r4, r0, code ; syscall`
#[allow(dead_code)]
pub fn exit_with(code: u16) -> Program {
    Program::new(
        TEXT_BASE,
        vec![0x2402_0011, 0x2404_0000 | code as u32, 0x0000_000C],
    )
}

/// `loop: beq r0, r0, loop ; nop`
#[allow(dead_code)]
pub fn endless_loop() -> Program {
    Program::new(TEXT_BASE, vec![0x1000_FFFF, 0x0000_0000])
}

/// Build a simulator over the reference backend
#[allow(dead_code)]
pub fn simulator(config: SimConfig, program: &Program) -> Simulator {
    let memory = LatencyMemory::from_config(&config.memory);
    Simulator::new(config, program, memory).unwrap()
}

/// Write `contents` to a temporary file kept alive by the returned handle
#[allow(dead_code)]
pub fn temp_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
