use regex::Regex;
use serde::{Deserialize, Serialize};

use super::SpatialError;
use crate::geom::{BoardPos, BoardRect};

/// Named rectangle on a floor that scripts place entities into.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpawnPoint {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub dx: i32,
    pub dy: i32,
}

impl SpawnPoint {
    pub fn rect(&self) -> BoardRect {
        BoardRect::new(self.x, self.y, self.dx, self.dy)
    }

    pub fn contains(&self, pos: BoardPos) -> bool {
        self.rect().contains(pos)
    }
}

pub fn compile_pattern(pattern: &str) -> Result<Regex, SpatialError> {
    Regex::new(pattern).map_err(|err| SpatialError::InvalidPattern {
        pattern: pattern.to_owned(),
        reason: err.to_string(),
    })
}

/// Stack of spawn-name patterns pushed by the script layer.
///
/// The top of the stack filters which spawn points placement may use.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnPatterns {
    stack: Vec<String>,
}

impl SpawnPatterns {
    pub fn push(&mut self, pattern: &str) -> Result<(), SpatialError> {
        compile_pattern(pattern)?;
        self.stack.push(pattern.to_owned());
        Ok(())
    }

    pub fn pop(&mut self) -> Option<String> {
        self.stack.pop()
    }

    pub fn top(&self) -> Option<&str> {
        self.stack.last().map(String::as_str)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_patterns_are_rejected() {
        let mut patterns = SpawnPatterns::default();
        assert!(patterns.push("intruder-.*").is_ok());
        assert!(matches!(
            patterns.push("("),
            Err(SpatialError::InvalidPattern { .. })
        ));
        assert_eq!(patterns.depth(), 1);
        assert_eq!(patterns.top(), Some("intruder-.*"));
    }
}
