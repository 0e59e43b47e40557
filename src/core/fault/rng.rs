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

//! Deterministic pseudo-random source for fault injection
//!
//! A xorshift64* generator: small, fast and reproducible from a single
//! seed, which is all fault scheduling needs.

use chrono::Utc;

/// Seeded pseudo-random generator used by the fault checker
#[derive(Debug, Clone)]
pub struct FaultRng {
    state: u64,
    seed: u64,
}

impl FaultRng {
    /// Create a generator from an explicit seed
    ///
    /// A zero seed is remapped since xorshift has an all-zero fixed point.
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 {
            0x9E37_79B9_7F4A_7C15
        } else {
            seed
        };
        let mut rng = Self { state, seed };
        // Decorrelate nearby seeds
        for _ in 0..4 {
            rng.next_u64();
        }
        rng
    }

    /// Create a generator seeded from the wall clock
    pub fn from_clock() -> Self {
        let now = Utc::now();
        let seed = now
            .timestamp_nanos_opt()
            .map(|n| n as u64)
            .unwrap_or_else(|| now.timestamp() as u64);
        log::info!("Fault Injector: RNG seeded from clock ({})", seed);
        Self::new(seed)
    }

    /// Seed this generator was created from
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Next 64-bit value
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Next 32-bit value (upper half of the 64-bit output)
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Uniform bit position in `0..32`
    pub fn bit_index(&mut self) -> u32 {
        self.next_u32() & 0x1F
    }

    /// Uniform register number in `1..=31`
    pub fn reg_1_31(&mut self) -> u8 {
        loop {
            let r = (self.next_u32() & 0x1F) as u8;
            if r != 0 {
                return r;
            }
        }
    }

    /// Uniform value in `0..bound` (`bound` must be non-zero)
    pub fn below(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = FaultRng::new(42);
        let mut b = FaultRng::new(42);
        for _ in 0..64 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = FaultRng::new(1);
        let mut b = FaultRng::new(2);
        let same = (0..16).filter(|_| a.next_u64() == b.next_u64()).count();
        assert!(same < 16);
    }

    #[test]
    fn test_zero_seed_is_usable() {
        let mut rng = FaultRng::new(0);
        assert_ne!(rng.next_u64(), 0);
        assert_eq!(rng.seed(), 0);
    }

    #[test]
    fn test_reg_1_31_never_zero() {
        let mut rng = FaultRng::new(7);
        for _ in 0..1000 {
            let r = rng.reg_1_31();
            assert!((1..=31).contains(&r));
        }
    }

    #[test]
    fn test_bit_index_in_range() {
        let mut rng = FaultRng::new(99);
        for _ in 0..1000 {
            assert!(rng.bit_index() < 32);
        }
    }
}
