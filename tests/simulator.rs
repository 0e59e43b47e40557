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

//! End-to-end runs through the public simulator API

mod common;

use common::assertions::{assert_drained, assert_fired, assert_reg};
use common::fixtures::*;
use mips4kc::core::config::SimConfig;
use mips4kc::core::fault::FaultLocation;
use mips4kc::core::value::FaultStatus;
use mips4kc::core::{MemorySubsystem, RunOutcome};

const VALUES: [u32; 5] = [1, 2, 3, 4, 5];

fn seeded() -> SimConfig {
    let mut config = SimConfig::default();
    config.fault.seed = 1;
    config
}

#[test]
fn test_array_sum_exits_with_total() {
    init_logging();
    let mut sim = simulator(seeded(), &array_sum(VALUES));

    assert_eq!(sim.run().unwrap(), RunOutcome::Exited(15));
    assert_reg(sim.cpu(), 6, 0);
    assert_reg(sim.cpu(), 5, ARRAY_BASE + 20);
    assert_eq!(sim.cpu().stats().retired, 30);
    assert_eq!(sim.memory().reads(), 5);
    assert_eq!(sim.memory().writes(), 0);
    assert_drained(sim.cpu());
}

#[test]
fn test_latency_pattern_slows_but_preserves_result() {
    init_logging();
    let fast = SimConfig::from_toml_str("[fault]\nseed = 1\n[memory]\nlatency = 0").unwrap();
    let slow = SimConfig::from_toml_str(
        r#"
        [fault]
        seed = 1

        [memory]
        latency_pattern = [4, 0, 7]
        "#,
    )
    .unwrap();

    let mut fast = simulator(fast, &array_sum(VALUES));
    let mut slow = simulator(slow, &array_sum(VALUES));
    assert_eq!(fast.run().unwrap(), RunOutcome::Exited(15));
    assert_eq!(slow.run().unwrap(), RunOutcome::Exited(15));

    assert!(slow.report().cycles > fast.report().cycles);
    assert!(slow.cpu().stats().mem_stall_count > fast.cpu().stats().mem_stall_count);
    assert_eq!(slow.cpu().stats().retired, fast.cpu().stats().retired);
}

#[test]
fn test_config_file_with_fault_script() {
    init_logging();
    let script = temp_file("# third load comes back with bit 8 set\nMEM_POST Event 3 0x100\n");
    let config = temp_file(&format!(
        "[fault]\nseed = 9\nscript = \"{}\"\n\n[memory]\nlatency = 1\n",
        script.path().display()
    ));

    let config = SimConfig::load(config.path()).unwrap();
    let mut sim = simulator(config, &array_sum(VALUES));

    assert_eq!(sim.run().unwrap(), RunOutcome::Exited(15 + 0x100));
    let report = sim.report();
    assert_fired(&report, FaultLocation::MemPost, 1);
    assert_eq!(report.faults.get(FaultLocation::MemPost).map(|s| s.events), Some(5));
    assert_eq!(report.fault_status.get(&FaultStatus::ReadMismatch), Some(&0));
}

#[test]
fn test_timeout_from_config() {
    let config = SimConfig::from_toml_str("timeout = 50").unwrap();
    let mut sim = simulator(config, &endless_loop());

    assert_eq!(sim.run().unwrap(), RunOutcome::Timeout);
    let report = sim.report();
    assert_eq!(report.ticks, 51);
    assert_eq!(report.outcome, RunOutcome::Timeout);
}

#[test]
fn test_writeback_redirected_to_other_register() {
    let script = temp_file("WB_ADDR Event 2 0x1\n");
    let mut config = seeded();
    config.fault.script = Some(script.path().to_path_buf());
    let mut sim = simulator(config, &exit_with(5));

    // a0 never receives 5; a1 does instead
    assert_eq!(sim.run().unwrap(), RunOutcome::Exited(0));
    assert_reg(sim.cpu(), 5, 5);
    assert_fired(&sim.report(), FaultLocation::WbAddr, 1);
}

#[test]
fn test_faulty_store_taints_memory() {
    // addiu r8, r0, 0x55 ; sw r8, 0x2000(r0) ; lw r4, 0x2000(r0)
    // addiu r2, r0, 17 ; syscall
    let program = mips4kc::core::Program::new(
        TEXT_BASE,
        vec![
            0x2408_0055,
            0xAC08_2000,
            0x8C04_2000,
            0x2402_0011,
            0x0000_000C,
        ],
    );
    let script = temp_file("MEM_PRE_DATA Event 1 0x1\n");
    let mut config = seeded();
    config.fault.script = Some(script.path().to_path_buf());
    let mut sim = simulator(config, &program);

    assert_eq!(sim.run().unwrap(), RunOutcome::Exited(0x54));
    assert_eq!(sim.memory().read_direct(0x2000, 4), Some(0x54));
    let report = sim.report();
    assert!(report.faulty_memory_bytes >= 1);
    assert_fired(&report, FaultLocation::MemPreData, 1);
}

#[test]
fn test_legacy_faults_reproducible_with_seed() {
    let run = || {
        let config = SimConfig::from_toml_str(
            r#"
            timeout = 4000

            [fault]
            locations = 0x40
            period = 20
            seed = 1234
            "#,
        )
        .unwrap();
        let mut sim = simulator(config, &array_sum(VALUES));
        let outcome = sim.run().unwrap();
        (outcome, sim.report())
    };

    let (first, a) = run();
    let (second, b) = run();
    assert_eq!(first, second);
    assert_eq!(a.faults, b.faults);
    assert_eq!(a.cycles, b.cycles);
    assert_eq!(a.fault_status, b.fault_status);
    assert_eq!(a.faults.seed, 1234);
}
