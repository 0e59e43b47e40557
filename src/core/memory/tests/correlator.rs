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

use proptest::prelude::*;

use super::super::*;
use crate::core::error::ProtocolViolation;

fn response(id: RequestId, data: &[u8]) -> MemResponse {
    MemResponse {
        id,
        data: data.to_vec(),
    }
}

#[test]
fn test_issue_complete_take() {
    let mut corr = Correlator::new();
    let id = corr.issue(7u32);
    assert_eq!(corr.outstanding(), 1);
    assert_eq!(corr.take(id, 7).unwrap(), None);

    corr.complete(response(id, &[1, 2])).unwrap();
    assert_eq!(corr.outstanding(), 0);
    assert_eq!(corr.completed(), 1);
    assert_eq!(corr.take(id, 7).unwrap(), Some(vec![1, 2]));

    // Consumed
    assert!(corr.state(id).is_none());
    assert_eq!(
        corr.take(id, 7),
        Err(ProtocolViolation::UnknownRequest(id))
    );
}

#[test]
fn test_ids_are_unique() {
    let mut corr = Correlator::new();
    let a = corr.issue(1u32);
    let b = corr.issue(1u32);
    assert_ne!(a, b);
    assert_eq!(corr.issued_total(), 2);
}

#[test]
fn test_unknown_response_is_violation() {
    let mut corr: Correlator<u32> = Correlator::new();
    assert_eq!(
        corr.complete(response(RequestId(99), &[])),
        Err(ProtocolViolation::UnknownRequest(RequestId(99)))
    );
}

#[test]
fn test_duplicate_response_is_violation() {
    let mut corr = Correlator::new();
    let id = corr.issue(1u32);
    corr.complete(response(id, &[5])).unwrap();
    assert_eq!(
        corr.complete(response(id, &[5])),
        Err(ProtocolViolation::DuplicateResponse(id))
    );
}

#[test]
fn test_wrong_owner_is_violation() {
    let mut corr = Correlator::new();
    let id = corr.issue(1u32);
    assert_eq!(corr.take(id, 2), Err(ProtocolViolation::WrongOwner { id }));
    corr.complete(response(id, &[5])).unwrap();
    assert_eq!(corr.take(id, 2), Err(ProtocolViolation::WrongOwner { id }));
    // The owner still gets it
    assert_eq!(corr.take(id, 1).unwrap(), Some(vec![5]));
}

#[test]
fn test_abandoned_response_is_drained_quietly() {
    let mut corr = Correlator::new();
    let id = corr.issue(3u32);
    corr.abandon(id);
    assert_eq!(corr.state(id), Some(&RequestState::Abandoned));
    assert_eq!(corr.outstanding(), 1);

    corr.complete(response(id, &[9])).unwrap();
    assert!(corr.state(id).is_none());
    assert_eq!(corr.drained_total(), 1);
    assert_eq!(corr.outstanding(), 0);
}

#[test]
fn test_abandon_after_completion_discards_payload() {
    let mut corr = Correlator::new();
    let id = corr.issue(3u32);
    corr.complete(response(id, &[9])).unwrap();
    corr.abandon(id);
    assert!(corr.state(id).is_none());
    assert_eq!(corr.drained_total(), 1);
}

#[test]
fn test_reverse_completion_attributed_by_id() {
    let mut corr = Correlator::new();
    let first = corr.issue(10u32);
    let second = corr.issue(11u32);

    corr.complete(response(second, &[0xBB])).unwrap();
    assert_eq!(corr.take(first, 10).unwrap(), None);
    corr.complete(response(first, &[0xAA])).unwrap();

    assert_eq!(corr.take(second, 11).unwrap(), Some(vec![0xBB]));
    assert_eq!(corr.take(first, 10).unwrap(), Some(vec![0xAA]));
}

proptest! {
    #[test]
    fn prop_any_completion_order_is_attributed(
        order in Just((0u32..12).collect::<Vec<_>>()).prop_shuffle()
    ) {
        let mut corr = Correlator::new();
        let ids: Vec<_> = (0u32..12).map(|owner| corr.issue(owner)).collect();

        for &owner in &order {
            let id = ids[owner as usize];
            corr.complete(response(id, &owner.to_le_bytes())).unwrap();
        }
        for (owner, &id) in ids.iter().enumerate() {
            let data = corr.take(id, owner as u32).unwrap().unwrap();
            prop_assert_eq!(bytes_to_u32(&data), owner as u32);
        }
        prop_assert_eq!(corr.outstanding(), 0);
    }
}
