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

//! Fault script parser
//!
//! One fault per line:
//!
//! ```text
//! <LOCATION> <Cycle|Event> <WHEN> <BITMASK>
//! ```
//!
//! - `LOCATION` is one of the fault location tags (case-sensitive)
//! - the trigger keyword is case-insensitive
//! - `WHEN` and `BITMASK` are decimal or `0x`-prefixed hexadecimal
//! - `#` anywhere starts a comment running to the end of the line
//!
//! # Example
//!
//! ```text
//! # At clock cycle 37, flip the least significant bit of the ALU output
//! ALU Cycle 37 0x00000001
//! # At the 4th time we use the MDU, flip all bits of the output
//! MDU Event 4 0xffffffff
//! ```

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::location::FaultLocation;
use crate::core::error::ScriptError;

/// Clock a scripted fault is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerKind {
    /// Pipeline cycle number
    Cycle,
    /// Per-location event count
    Event,
}

impl FromStr for TriggerKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cycle" => Ok(TriggerKind::Cycle),
            "event" => Ok(TriggerKind::Event),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Cycle => f.write_str("Cycle"),
            TriggerKind::Event => f.write_str("Event"),
        }
    }
}

/// One scripted fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptFault {
    /// Where to inject
    pub location: FaultLocation,
    /// Which clock `when` refers to
    pub kind: TriggerKind,
    /// Cycle number or event count at which the fault fires
    pub when: u64,
    /// Bits to flip (never zero)
    pub bits: u32,
}

impl fmt::Display for ScriptFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} 0x{:08x}",
            self.location, self.kind, self.when, self.bits
        )
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal number
fn parse_num(text: &str, line: usize) -> Result<u64, ScriptError> {
    let parsed = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse::<u64>(),
    };
    parsed.map_err(|_| ScriptError::InvalidNumber {
        line,
        text: text.to_string(),
    })
}

/// Parse a single script line
///
/// Returns `Ok(None)` for blank and comment-only lines.
fn parse_line(raw: &str, line: usize) -> Result<Option<ScriptFault>, ScriptError> {
    let content = match raw.find('#') {
        Some(pos) => {
            log::debug!("COMMENT: {}", raw[pos + 1..].trim());
            &raw[..pos]
        }
        None => raw,
    };

    let mut fields = content.split_whitespace();
    let Some(loc_text) = fields.next() else {
        return Ok(None);
    };

    let location = loc_text
        .parse::<FaultLocation>()
        .map_err(|_| ScriptError::UnknownLocation {
            line,
            name: loc_text.to_string(),
        })?;

    let trigger = fields.next().ok_or(ScriptError::MissingField {
        line,
        field: "trigger",
    })?;
    let kind = trigger
        .parse::<TriggerKind>()
        .map_err(|_| ScriptError::InvalidTrigger {
            line,
            trigger: trigger.to_string(),
        })?;

    let when_text = fields.next().ok_or(ScriptError::MissingField {
        line,
        field: "when",
    })?;
    let when = parse_num(when_text, line)?;

    let bits_text = fields.next().ok_or(ScriptError::MissingField {
        line,
        field: "bitmask",
    })?;
    let bits = u32::try_from(parse_num(bits_text, line)?).map_err(|_| {
        ScriptError::InvalidNumber {
            line,
            text: bits_text.to_string(),
        }
    })?;

    if let Some(extra) = fields.next() {
        return Err(ScriptError::UnexpectedField {
            line,
            text: extra.to_string(),
        });
    }

    if bits == 0 {
        return Err(ScriptError::ZeroMask { line });
    }

    let fault = ScriptFault {
        location,
        kind,
        when,
        bits,
    };
    log::debug!("Fault Loc {} @ {} flip: 0x{:x}", location, when, bits);
    Ok(Some(fault))
}

/// Parse a whole fault script
///
/// # Errors
///
/// Any malformed line aborts the parse; no partial result is returned.
pub fn parse_script(text: &str) -> Result<Vec<ScriptFault>, ScriptError> {
    let mut faults = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        if let Some(fault) = parse_line(raw, i + 1)? {
            faults.push(fault);
        }
    }
    Ok(faults)
}

/// Read and parse a fault script file
pub fn load_script(path: &Path) -> Result<Vec<ScriptFault>, ScriptError> {
    let text = fs::read_to_string(path).map_err(|source| ScriptError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let faults = parse_script(&text)?;
    log::info!(
        "Fault Injector: loaded {} scripted faults from {}",
        faults.len(),
        path.display()
    );
    Ok(faults)
}
