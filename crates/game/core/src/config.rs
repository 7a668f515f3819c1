use serde::{Deserialize, Serialize};

/// Game configuration constants and tunable parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Sight radius for entity defs that do not specify one.
    pub default_sight: i32,
    /// Cells per second for entity defs that do not specify a walking speed.
    pub default_walking_speed: f64,
    /// Frame step used when an exec is driven to completion without a renderer
    /// (replays, `DoExec`, tests).
    pub replay_step: f64,
    /// Upper bound on `Maintain` calls for a single exec before it is abandoned.
    pub max_maintain_steps: u32,
}

impl GameConfig {
    // ===== compile-time constants =====
    /// Side of the square LOS grid and texture, in cells. Power of two.
    pub const LOS_TEXTURE_SIZE: usize = 128;
    /// Alpha below which a texture cell counts as never seen.
    pub const MIN_VISIBILITY: u8 = 32;
    /// Alpha at or above which a texture cell answers `true` to boolean queries.
    pub const VISIBILITY_THRESHOLD: u8 = 200;
    pub const MAX_FLOORS: usize = 4;
    /// AP debited per cell of movement.
    pub const STEP_COST: i32 = 1;

    // ===== runtime-tunable defaults =====
    pub const DEFAULT_SIGHT: i32 = 10;
    pub const DEFAULT_WALKING_SPEED: f64 = 4.0;
    pub const DEFAULT_REPLAY_STEP: f64 = 1.0 / 30.0;
    pub const DEFAULT_MAX_MAINTAIN_STEPS: u32 = 100_000;

    pub fn new() -> Self {
        Self {
            default_sight: Self::DEFAULT_SIGHT,
            default_walking_speed: Self::DEFAULT_WALKING_SPEED,
            replay_step: Self::DEFAULT_REPLAY_STEP,
            max_maintain_steps: Self::DEFAULT_MAX_MAINTAIN_STEPS,
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::new()
    }
}
