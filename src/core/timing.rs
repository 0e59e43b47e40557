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

//! Half-cycle clock
//!
//! The pipeline is driven at twice its nominal rate. Each raw clock tick is
//! one half of a pipeline cycle:
//!
//! - even ticks are **rising** edges: pending memory requests are issued
//! - odd ticks are **falling** edges: stations commit results and retire
//!
//! The pipeline cycle is the raw tick shifted right by one.
//!
//! # Timeout
//!
//! An optional ceiling is compared against the raw tick count. Once the
//! count exceeds it, the clock stops producing edges.
//!
//! # Example
//!
//! ```
//! use mips4kc::core::timing::{ClockEdge, HalfCycleClock};
//!
//! let mut clock = HalfCycleClock::new(Some(3));
//!
//! let t = clock.advance().unwrap();
//! assert_eq!((t.cycle, t.edge), (0, ClockEdge::Rising));
//! let t = clock.advance().unwrap();
//! assert_eq!((t.cycle, t.edge), (0, ClockEdge::Falling));
//!
//! clock.advance();
//! clock.advance();
//! assert!(clock.advance().is_none());
//! ```

use serde::Serialize;

/// Global tick counter type (half-cycles since reset)
pub type GlobalTicks = u64;

/// Which half of a pipeline cycle a tick is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ClockEdge {
    /// Memory issue half
    Rising,
    /// Commit half
    Falling,
}

/// One raw clock tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTick {
    /// Raw half-cycle count
    pub tick: GlobalTicks,
    /// Pipeline cycle (`tick >> 1`)
    pub cycle: u64,
    pub edge: ClockEdge,
}

impl ClockTick {
    /// Decompose a raw tick count
    #[inline(always)]
    pub fn from_raw(tick: GlobalTicks) -> Self {
        Self {
            tick,
            cycle: tick >> 1,
            edge: if tick & 1 == 1 {
                ClockEdge::Falling
            } else {
                ClockEdge::Rising
            },
        }
    }

    #[inline(always)]
    pub fn is_falling(&self) -> bool {
        self.edge == ClockEdge::Falling
    }
}

/// Clock driving the pipeline
#[derive(Debug, Clone)]
pub struct HalfCycleClock {
    /// Next raw tick to produce
    ticks: GlobalTicks,

    /// Raw tick ceiling (None = unlimited)
    timeout: Option<GlobalTicks>,

    /// Progress line interval, in pipeline cycles
    progress_interval: u64,
}

impl HalfCycleClock {
    /// Progress is logged every this many pipeline cycles
    pub const PROGRESS_INTERVAL: u64 = 0x2000;

    /// Create a clock with an optional raw-tick ceiling
    ///
    /// The ceiling is fixed for the lifetime of the clock.
    pub fn new(timeout: Option<GlobalTicks>) -> Self {
        Self {
            ticks: 0,
            timeout,
            progress_interval: Self::PROGRESS_INTERVAL,
        }
    }

    /// Raw ticks produced so far
    pub fn ticks(&self) -> GlobalTicks {
        self.ticks
    }

    /// Current pipeline cycle
    pub fn cycle(&self) -> u64 {
        self.ticks >> 1
    }

    pub fn timeout(&self) -> Option<GlobalTicks> {
        self.timeout
    }

    /// Whether the next tick is past the ceiling
    pub fn timed_out(&self) -> bool {
        self.timeout.is_some_and(|limit| self.ticks > limit)
    }

    /// Produce the next tick, or `None` once the ceiling is passed
    pub fn advance(&mut self) -> Option<ClockTick> {
        if self.timed_out() {
            return None;
        }
        let tick = ClockTick::from_raw(self.ticks);
        self.ticks += 1;

        log::trace!("tick {} (cycle {}, {:?})", tick.tick, tick.cycle, tick.edge);
        if tick.is_falling() && tick.cycle > 0 && tick.cycle % self.progress_interval == 0 {
            log::info!("Pipeline cycle {}", tick.cycle);
        }
        Some(tick)
    }
}

impl Default for HalfCycleClock {
    fn default() -> Self {
        Self::new(None)
    }
}
