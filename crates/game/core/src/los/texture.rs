use std::sync::Arc;

use crate::config::GameConfig;
use crate::geom::{BoardPos, BoardRect};

/// 8-bit alpha map, one texel per board cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LosTexture {
    size: usize,
    pix: Vec<u8>,
}

impl Default for LosTexture {
    fn default() -> Self {
        Self::new(GameConfig::LOS_TEXTURE_SIZE)
    }
}

impl LosTexture {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            pix: vec![0; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn index(&self, pos: BoardPos) -> Option<usize> {
        let size = self.size as i32;
        (pos.x >= 0 && pos.y >= 0 && pos.x < size && pos.y < size)
            .then(|| pos.x as usize + pos.y as usize * self.size)
    }

    pub fn get(&self, pos: BoardPos) -> u8 {
        self.index(pos).map(|i| self.pix[i]).unwrap_or(0)
    }

    pub fn set(&mut self, pos: BoardPos, alpha: u8) {
        if let Some(i) = self.index(pos) {
            self.pix[i] = alpha;
        }
    }

    pub fn fill(&mut self, alpha: u8) {
        self.pix.fill(alpha);
    }

    /// Any texel in `rect` at or above the boolean visibility threshold.
    pub fn any_visible(&self, rect: &BoardRect) -> bool {
        rect.cells()
            .any(|pos| self.get(pos) >= GameConfig::VISIBILITY_THRESHOLD)
    }

    /// Immutable copy for consumers outside the game task.
    pub fn snapshot(&self) -> Arc<[u8]> {
        Arc::from(self.pix.as_slice())
    }
}
