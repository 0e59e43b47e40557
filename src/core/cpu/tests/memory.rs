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
use super::Harness;
use crate::core::error::Result;
use crate::core::memory::{LatencyMemory, MemRequest, MemResponse, MemorySubsystem};
use crate::core::value::FaultStatus;

#[test]
fn test_load_use_stalls_then_forwards() {
    let mut h = Harness::new(vec![lw(1, 0x100, 0), addiu(2, 1, 1), syscall()]);
    h.data(0x100, &[0x44, 0x33, 0x22, 0x11]);

    assert_eq!(h.run(), RunOutcome::Exited(0));
    assert_eq!(h.cpu.reg(1), 0x1122_3344);
    assert_eq!(h.cpu.reg(2), 0x1122_3345);
    assert!(h.cpu.stats().hazard_stalls > 0);
    assert_eq!(h.cpu.stats().total_mem_ops, 1);
}

#[test]
fn test_store_then_load() {
    let mut h = Harness::new(vec![
        addiu(1, 0, 0x55),
        sw(1, 0x200, 0),
        lw(2, 0x200, 0),
        syscall(),
    ]);
    h.run();
    assert_eq!(h.cpu.reg(2), 0x55);
    assert_eq!(h.mem.read_direct(0x200, 4), Some(0x55));
    assert_eq!(h.cpu.stats().total_mem_ops, 2);
    assert_eq!(h.cpu.correlator().outstanding(), 0);
}

#[test]
fn test_sub_word_loads_extend() {
    let mut h = Harness::new(vec![
        lb(1, 0x300, 0),
        lbu(2, 0x300, 0),
        lh(3, 0x300, 0),
        addiu(4, 0, 0x1AB),
        sb(4, 0x304, 0),
        lw(5, 0x304, 0),
        syscall(),
    ]);
    h.data(0x300, &[0x80, 0x90, 0, 0]);
    h.run();
    assert_eq!(h.cpu.reg(1), 0xFFFF_FF80);
    assert_eq!(h.cpu.reg(2), 0x80);
    assert_eq!(h.cpu.reg(3), 0xFFFF_9080);
    assert_eq!(h.cpu.reg(5), 0xAB);
}

#[test]
fn test_zero_latency_never_stalls_mem() {
    let mut h = Harness::new(vec![lw(1, 0x100, 0), sw(1, 0x104, 0), syscall()]).latencies(vec![0]);
    h.run();
    assert_eq!(h.cpu.stats().mem_stall_count, 0);
}

#[test]
fn test_latency_shows_up_as_mem_stalls() {
    let program = vec![lw(1, 0x100, 0), sw(1, 0x104, 0), syscall()];

    let mut fast = Harness::new(program.clone()).latencies(vec![1]);
    fast.data(0x100, &[9, 0, 0, 0]);
    fast.run();

    let mut slow = Harness::new(program).latencies(vec![5]);
    slow.data(0x100, &[9, 0, 0, 0]);
    slow.run();

    assert_eq!(fast.cpu.stats().mem_stall_count, 2);
    assert_eq!(slow.cpu.stats().mem_stall_count, 10);
    assert_eq!(slow.mem.read_direct(0x104, 4), Some(9));
    assert!(slow.finished_at > fast.finished_at);
}

#[test]
fn test_irregular_latencies_keep_results() {
    let mut h = Harness::new(vec![
        addiu(1, 0, 1),
        sw(1, 0x10, 0),
        addiu(1, 1, 1),
        sw(1, 0x14, 0),
        lw(2, 0x10, 0),
        lw(3, 0x14, 0),
        addu(4, 2, 3),
        syscall(),
    ])
    .latencies(vec![3, 0, 2, 1]);
    h.run();
    assert_eq!(h.cpu.reg(4), 3);
    assert_eq!(h.cpu.context().count(FaultStatus::ReadMismatch), 0);
    assert_eq!(h.cpu.correlator().issued_total(), 4);
}

/// Reference memory that records the deepest request queue it saw
struct QueueDepth {
    inner: LatencyMemory,
    deepest: usize,
}

impl MemorySubsystem for QueueDepth {
    fn send(&mut self, request: MemRequest) {
        self.inner.send(request);
        self.deepest = self.deepest.max(self.inner.pending());
    }

    fn poll(&mut self, now: u64) -> Vec<MemResponse> {
        self.inner.poll(now)
    }

    fn init_data(&mut self, address: u32, bytes: &[u8]) -> Result<()> {
        self.inner.init_data(address, bytes)
    }

    fn read_direct(&self, address: u32, size: u32) -> Option<u32> {
        self.inner.read_direct(address, size)
    }

    fn pending(&self) -> usize {
        self.inner.pending()
    }
}

#[test]
fn test_each_load_gets_its_own_payload() {
    // Latencies alternate long and short, so a queued request would overtake
    let mut h = Harness::new(vec![
        lw(1, 0x100, 0),
        lw(2, 0x104, 0),
        lw(3, 0x108, 0),
        lw(4, 0x10C, 0),
        syscall(),
    ]);
    let mut mem = QueueDepth {
        inner: LatencyMemory::with_latencies(0, 0x1_0000, vec![5, 0, 3, 1]),
        deepest: 0,
    };
    for (i, address) in [0x100u32, 0x104, 0x108, 0x10C].into_iter().enumerate() {
        let bytes = [0x11 * (i as u8 + 1), 0, 0, 0];
        mem.init_data(address, &bytes).unwrap();
        h.cpu.context_mut().init_orig_mem(address, &bytes);
    }

    for cycle in 0..500 {
        h.cpu.rising_edge(cycle, &mut mem).unwrap();
        h.cpu.falling_edge(cycle, &mut mem).unwrap();
        if h.cpu.outcome().is_finished() {
            break;
        }
    }

    assert_eq!(h.cpu.outcome(), RunOutcome::Exited(0));
    assert_eq!(
        [h.cpu.reg(1), h.cpu.reg(2), h.cpu.reg(3), h.cpu.reg(4)],
        [0x11, 0x22, 0x33, 0x44]
    );
    // MEM holds one record, so only one request is ever in flight
    assert_eq!(mem.deepest, 1);
    assert_eq!(h.cpu.correlator().issued_total(), 4);
    assert_eq!(h.cpu.correlator().outstanding(), 0);
    assert_eq!(h.cpu.context().count(FaultStatus::ReadMismatch), 0);
}
