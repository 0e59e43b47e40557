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

//! Fault injection engine
//!
//! Faults are scheduled per [`FaultLocation`] by two independent sources:
//!
//! - legacy: one random trigger per armed location, drawn at startup from
//!   `[0, period)` and matched against the cycle or the location's event count
//! - script: explicit `<LOCATION> <Cycle|Event> <WHEN> <BITMASK>` entries
//!
//! [`FaultChecker`] consults both on every check and applies the result at
//! the pipeline's injection points.

mod checker;
mod location;
mod rng;
mod schedule;
mod script;

pub use checker::{FaultChecker, FaultStats, LocationStats, REGISTER_COUNT};
pub use location::{FaultLocation, FaultLocations, UnknownLocation, LOCATION_COUNT};
pub use rng::FaultRng;
pub use schedule::{FaultClock, FaultSource, LegacySchedule, ScriptSchedule};
pub use script::{load_script, parse_script, ScriptFault, TriggerKind};
