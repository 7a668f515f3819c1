//! The game PRNG.
//!
//! Every random draw that affects game state goes through [`GameRng`], which
//! is part of the serialized [`Game`](crate::Game). Replaying the same exec
//! stream from the same saved state therefore reproduces every roll.

use serde::{Deserialize, Serialize};

/// PCG-XSH-RR generator: 64-bit state, 32-bit output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRng {
    state: u64,
    draws: u64,
}

impl GameRng {
    const MULTIPLIER: u64 = 6364136223846793005;
    const INCREMENT: u64 = 1442695040888963407;

    pub fn seeded(seed: u64) -> Self {
        let mut rng = Self { state: 0, draws: 0 };
        rng.state = Self::pcg_step(seed.wrapping_add(Self::INCREMENT));
        rng
    }

    #[inline]
    fn pcg_step(state: u64) -> u64 {
        state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT)
    }

    #[inline]
    fn pcg_output(state: u64) -> u32 {
        let xorshifted = (((state >> 18) ^ state) >> 27) as u32;
        let rot = (state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    pub fn next_u32(&mut self) -> u32 {
        let old = self.state;
        self.state = Self::pcg_step(old);
        self.draws += 1;
        Self::pcg_output(old)
    }

    /// Uniform draw in `1..=n`. `n <= 1` always yields 1 but still advances
    /// the generator so draw counts stay aligned across peers.
    pub fn rand(&mut self, n: i32) -> i32 {
        let value = self.next_u32();
        if n <= 1 {
            return 1;
        }
        (value % n as u32) as i32 + 1
    }

    /// Uniform draw in `0..n`; `n == 0` yields 0.
    pub fn below(&mut self, n: u32) -> u32 {
        let value = self.next_u32();
        if n == 0 { 0 } else { value % n }
    }

    /// Number of values drawn since seeding.
    pub fn draws(&self) -> u64 {
        self.draws
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = GameRng::seeded(100);
        let mut b = GameRng::seeded(100);
        let xs: Vec<_> = (0..16).map(|_| a.rand(20)).collect();
        let ys: Vec<_> = (0..16).map(|_| b.rand(20)).collect();
        assert_eq!(xs, ys);
        assert_eq!(a.draws(), 16);
    }

    #[test]
    fn rand_stays_in_range() {
        let mut rng = GameRng::seeded(7);
        for _ in 0..1000 {
            let v = rng.rand(6);
            assert!((1..=6).contains(&v));
        }
        assert_eq!(rng.rand(0), 1);
    }

    #[test]
    fn serialized_state_resumes_sequence() {
        let mut rng = GameRng::seeded(42);
        rng.rand(10);
        let bytes = bincode::serialize(&rng).unwrap();
        let mut restored: GameRng = bincode::deserialize(&bytes).unwrap();
        assert_eq!(rng.next_u32(), restored.next_u32());
    }
}
