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

//! Outstanding-request correlation
//!
//! Every request moves through one state machine:
//!
//! ```text
//! issue()        complete()                take()
//!   ──> Issued ──────────────> Completed ──────────> (consumed, removed)
//!         │                       │
//!         │ abandon()             │ abandon()
//!         v                       v
//!     Abandoned ── complete() ─> (drained, removed)
//! ```
//!
//! A response for an id the correlator has never issued, or has already
//! finished with, is a [`ProtocolViolation`].

use std::collections::HashMap;
use std::fmt::Debug;

use super::{MemResponse, RequestId};
use crate::core::error::ProtocolViolation;

/// State of one outstanding request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState<K> {
    /// Sent, awaiting its response
    Issued(K),
    /// Response arrived, awaiting its owner
    Completed(K, Vec<u8>),
    /// Owner was squashed; the response will be dropped
    Abandoned,
}

/// Maps request ids to the owner that issued them
///
/// `K` identifies the owner (a pipeline stage record).
#[derive(Debug, Clone)]
pub struct Correlator<K> {
    next_id: u64,
    requests: HashMap<RequestId, RequestState<K>>,
    issued: u64,
    drained: u64,
}

impl<K: Copy + Eq + Debug> Correlator<K> {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            requests: HashMap::new(),
            issued: 0,
            drained: 0,
        }
    }

    /// Allocate a fresh id owned by `owner`
    pub fn issue(&mut self, owner: K) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        self.issued += 1;
        self.requests.insert(id, RequestState::Issued(owner));
        id
    }

    /// Record an arriving response
    ///
    /// # Errors
    ///
    /// `UnknownRequest` if the id is not outstanding, `DuplicateResponse` if
    /// a response for it is already waiting.
    pub fn complete(&mut self, response: MemResponse) -> Result<(), ProtocolViolation> {
        let id = response.id;
        let Some(state) = self.requests.get_mut(&id) else {
            return Err(ProtocolViolation::UnknownRequest(id));
        };

        match state {
            RequestState::Issued(owner) => {
                let owner = *owner;
                *state = RequestState::Completed(owner, response.data);
                Ok(())
            }
            RequestState::Completed(..) => Err(ProtocolViolation::DuplicateResponse(id)),
            RequestState::Abandoned => {
                log::debug!("Draining response for abandoned request {}", id);
                self.requests.remove(&id);
                self.drained += 1;
                Ok(())
            }
        }
    }

    /// Poll for the response to `id` on behalf of `owner`
    ///
    /// Returns `Ok(None)` while the response has not arrived. A returned
    /// payload is consumed.
    ///
    /// # Errors
    ///
    /// `WrongOwner` if `owner` did not issue `id`, `UnknownRequest` if the id
    /// is not outstanding.
    pub fn take(
        &mut self,
        id: RequestId,
        owner: K,
    ) -> Result<Option<Vec<u8>>, ProtocolViolation> {
        match self.requests.get(&id) {
            None => Err(ProtocolViolation::UnknownRequest(id)),
            Some(RequestState::Issued(o)) if *o == owner => Ok(None),
            Some(RequestState::Completed(o, _)) if *o == owner => {
                match self.requests.remove(&id) {
                    Some(RequestState::Completed(_, data)) => Ok(Some(data)),
                    _ => Err(ProtocolViolation::UnknownRequest(id)),
                }
            }
            Some(_) => Err(ProtocolViolation::WrongOwner { id }),
        }
    }

    /// Give up on `id`; its response, if any, is dropped quietly
    pub fn abandon(&mut self, id: RequestId) {
        match self.requests.get(&id) {
            Some(RequestState::Issued(_)) => {
                self.requests.insert(id, RequestState::Abandoned);
            }
            Some(RequestState::Completed(..)) => {
                self.requests.remove(&id);
                self.drained += 1;
            }
            Some(RequestState::Abandoned) | None => {}
        }
    }

    /// State of a request, if it is still tracked
    pub fn state(&self, id: RequestId) -> Option<&RequestState<K>> {
        self.requests.get(&id)
    }

    /// Requests still awaiting a response
    pub fn outstanding(&self) -> usize {
        self.requests
            .values()
            .filter(|s| !matches!(s, RequestState::Completed(..)))
            .count()
    }

    /// Responses waiting for their owner
    pub fn completed(&self) -> usize {
        self.requests.len() - self.outstanding()
    }

    /// Total ids handed out
    pub fn issued_total(&self) -> u64 {
        self.issued
    }

    /// Responses dropped because their owner was squashed
    pub fn drained_total(&self) -> u64 {
        self.drained
    }
}

impl<K: Copy + Eq + Debug> Default for Correlator<K> {
    fn default() -> Self {
        Self::new()
    }
}
