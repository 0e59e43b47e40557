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

//! Fault schedule store
//!
//! Two independent schedule sources decide whether a location faults:
//!
//! - [`LegacySchedule`]: one randomly drawn trigger per armed location,
//!   matched against either the cycle or the location's event count
//! - [`ScriptSchedule`]: per-location queues of scripted faults, one queue
//!   per trigger kind, served nearest-due first
//!
//! Both implement [`FaultSource`]; the fault checker composes them.

use super::location::{FaultLocation, FaultLocations, LOCATION_COUNT};
use super::rng::FaultRng;
use super::script::{ScriptFault, TriggerKind};

/// Clocks visible to a schedule when a location is checked
#[derive(Debug, Clone, Copy)]
pub struct FaultClock<'a> {
    /// Current pipeline cycle
    pub cycle: u64,
    /// Event counters of every location (already advanced for this check)
    pub events: &'a [u64; LOCATION_COUNT],
}

impl FaultClock<'_> {
    /// Event count of one location
    #[inline(always)]
    pub fn events_of(&self, location: FaultLocation) -> u64 {
        self.events[location.index()]
    }
}

/// A source of fault decisions
pub trait FaultSource {
    /// Short name used in diagnostics
    fn name(&self) -> &'static str;

    /// Decide whether `location` faults now
    ///
    /// Returns the bits to flip when it does. A returned mask of zero asks
    /// the caller to pick a random bit.
    fn check_location(&mut self, location: FaultLocation, clock: &FaultClock<'_>) -> Option<u32>;
}

/// Randomly scheduled single-shot faults
#[derive(Debug, Clone)]
pub struct LegacySchedule {
    /// Pending trigger per location (None = not armed or already fired)
    triggers: [Option<u64>; LOCATION_COUNT],
    /// Bits to flip (0 = random)
    bits: u32,
    /// Match triggers against the cycle instead of the event count
    by_time: bool,
    /// Match MEM_POST against the MEM_PRE_ADDR event count
    mem_post_counts_pre_addr: bool,
}

impl LegacySchedule {
    /// Draw one trigger in `[0, period)` for every armed location
    pub fn new(
        locations: FaultLocations,
        period: u64,
        bits: u32,
        by_time: bool,
        rng: &mut FaultRng,
    ) -> Self {
        let mut triggers = [None; LOCATION_COUNT];
        log::info!("Fault Injector: Inject faults at 0x{:x}", locations.bits());
        log::info!("Fault Injector: Bitmask 0x{:x}", bits);

        for loc in FaultLocation::ALL {
            if locations.contains(loc.flag()) && period > 0 {
                let when = rng.below(period);
                log::info!(" Will Inject {} at {}", loc, when);
                triggers[loc.index()] = Some(when);
            }
        }

        Self {
            triggers,
            bits,
            by_time,
            mem_post_counts_pre_addr: false,
        }
    }

    /// Schedule with explicit triggers
    pub fn with_triggers(
        triggers: impl IntoIterator<Item = (FaultLocation, u64)>,
        bits: u32,
        by_time: bool,
    ) -> Self {
        let mut table = [None; LOCATION_COUNT];
        for (loc, when) in triggers {
            table[loc.index()] = Some(when);
        }
        Self {
            triggers: table,
            bits,
            by_time,
            mem_post_counts_pre_addr: false,
        }
    }

    /// Schedule that never fires
    pub fn disabled() -> Self {
        Self::with_triggers([], 0, false)
    }

    /// Match MEM_POST event triggers against the MEM_PRE_ADDR count
    pub fn set_mem_post_counts_pre_addr(&mut self, enabled: bool) {
        self.mem_post_counts_pre_addr = enabled;
    }

    /// Pending trigger of a location
    pub fn trigger(&self, location: FaultLocation) -> Option<u64> {
        self.triggers[location.index()]
    }

    /// Whether triggers are matched against the cycle
    pub fn by_time(&self) -> bool {
        self.by_time
    }
}

impl FaultSource for LegacySchedule {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn check_location(&mut self, location: FaultLocation, clock: &FaultClock<'_>) -> Option<u32> {
        let when = self.triggers[location.index()]?;
        let now = if self.by_time {
            clock.cycle
        } else if location == FaultLocation::MemPost && self.mem_post_counts_pre_addr {
            clock.events_of(FaultLocation::MemPreAddr)
        } else {
            clock.events_of(location)
        };

        if now == when {
            self.triggers[location.index()] = None;
            Some(self.bits)
        } else {
            None
        }
    }
}

/// Scripted faults
///
/// Each queue is kept sorted by `when`, descending, so the nearest-due entry
/// sits at the back and is popped in O(1).
#[derive(Debug, Clone, Default)]
pub struct ScriptSchedule {
    by_cycle: [Vec<ScriptFault>; LOCATION_COUNT],
    by_event: [Vec<ScriptFault>; LOCATION_COUNT],
}

impl ScriptSchedule {
    /// Build the queues from parsed entries (any order)
    pub fn from_entries(entries: impl IntoIterator<Item = ScriptFault>) -> Self {
        let mut schedule = Self::default();
        for fault in entries {
            schedule.queue_mut(fault.location, fault.kind).push(fault);
        }
        for queue in schedule
            .by_cycle
            .iter_mut()
            .chain(schedule.by_event.iter_mut())
        {
            // Among equal `when`s the earliest script line ends up at the back
            queue.reverse();
            queue.sort_by(|a, b| b.when.cmp(&a.when));
        }
        schedule
    }

    fn queue_mut(&mut self, location: FaultLocation, kind: TriggerKind) -> &mut Vec<ScriptFault> {
        match kind {
            TriggerKind::Cycle => &mut self.by_cycle[location.index()],
            TriggerKind::Event => &mut self.by_event[location.index()],
        }
    }

    fn queue(&self, location: FaultLocation, kind: TriggerKind) -> &[ScriptFault] {
        match kind {
            TriggerKind::Cycle => &self.by_cycle[location.index()],
            TriggerKind::Event => &self.by_event[location.index()],
        }
    }

    /// Next entry due for a location and trigger kind
    pub fn peek(&self, location: FaultLocation, kind: TriggerKind) -> Option<&ScriptFault> {
        self.queue(location, kind).last()
    }

    /// Entries still pending for a location and trigger kind
    pub fn pending(&self, location: FaultLocation, kind: TriggerKind) -> usize {
        self.queue(location, kind).len()
    }

    /// Total entries still pending
    pub fn len(&self) -> usize {
        self.by_cycle
            .iter()
            .chain(self.by_event.iter())
            .map(Vec::len)
            .sum()
    }

    /// Whether no entries are pending
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume the head of one queue if it is due at `now`
    ///
    /// Entries whose `when` has already passed can never match again and
    /// are dropped. After a hit, remaining entries at the same `when` are
    /// dropped as well: only the first exact match fires.
    fn take_due(&mut self, location: FaultLocation, kind: TriggerKind, now: u64) -> Option<u32> {
        let queue = self.queue_mut(location, kind);

        while let Some(head) = queue.last() {
            if head.when >= now {
                break;
            }
            log::debug!("Dropping passed scripted fault ({})", head);
            queue.pop();
        }

        let head = queue.last()?;
        if head.when != now {
            return None;
        }
        let bits = head.bits;
        queue.pop();

        while queue.last().is_some_and(|f| f.when == now) {
            if let Some(dup) = queue.pop() {
                log::debug!("Dropping duplicate scripted fault ({})", dup);
            }
        }
        Some(bits)
    }
}

impl FaultSource for ScriptSchedule {
    fn name(&self) -> &'static str {
        "script"
    }

    fn check_location(&mut self, location: FaultLocation, clock: &FaultClock<'_>) -> Option<u32> {
        let by_cycle = self.take_due(location, TriggerKind::Cycle, clock.cycle);
        let by_event = self.take_due(location, TriggerKind::Event, clock.events_of(location));

        match (by_cycle, by_event) {
            (Some(c), Some(e)) => {
                log::info!(
                    "By-cycle and by-event fault occur simultaneously. Combining faults ({:x}|{:x} = {:x})",
                    c,
                    e,
                    c | e
                );
                Some(c | e)
            }
            (c, e) => c.or(e),
        }
    }
}
