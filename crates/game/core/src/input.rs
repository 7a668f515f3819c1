//! Player input as seen by actions, and the named key-binding map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geom::BoardPos;

/// Names scripts and actions use to query bindings.
pub const NAMED_ACTIONS: [&str; 18] = [
    "quit",
    "console",
    "save",
    "load",
    "game mode",
    "room editor",
    "house editor",
    "cpu profile",
    "heap profile",
    "manual mem",
    "screenshot",
    "foo",
    "flip",
    "rotate left",
    "rotate right",
    "zoom in",
    "zoom out",
    "drag",
];

/// Input already resolved to board cells by the host's viewer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    /// Named action from the [`KeyMap`].
    Key(String),
    MouseMove(BoardPos),
    Click(BoardPos),
    /// Ready the prepped action instead of committing it.
    Ready,
    Cancel,
    EndTurn,
}

/// Named action to key binding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMap {
    bindings: BTreeMap<String, String>,
}

impl Default for KeyMap {
    fn default() -> Self {
        let keys = [
            "Escape", "`", "F5", "F9", "F1", "F2", "F3", "F10", "F11", "F12", "F8", "F7", "f",
            "q", "e", "=", "-", "Mouse2",
        ];
        Self {
            bindings: NAMED_ACTIONS
                .iter()
                .zip(keys)
                .map(|(name, key)| (name.to_string(), key.to_string()))
                .collect(),
        }
    }
}

impl KeyMap {
    /// Rebinds `name`. Unknown names are rejected.
    pub fn bind(&mut self, name: &str, key: impl Into<String>) -> bool {
        if !NAMED_ACTIONS.contains(&name) {
            return false;
        }
        self.bindings.insert(name.to_string(), key.into());
        true
    }

    pub fn key_for(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(String::as_str)
    }

    /// Named action bound to `key`, if any.
    pub fn action_for(&self, key: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(_, bound)| bound.as_str() == key)
            .map(|(name, _)| name.as_str())
    }

    /// Translates a raw key press into the named input actions understand.
    pub fn translate(&self, key: &str) -> Option<InputEvent> {
        self.action_for(key)
            .map(|name| InputEvent::Key(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_named_action_is_bound() {
        let map = KeyMap::default();
        for name in NAMED_ACTIONS {
            assert!(map.key_for(name).is_some(), "{name} unbound");
        }
        assert_eq!(map.action_for("F5"), Some("save"));
    }

    #[test]
    fn rebinding() {
        let mut map = KeyMap::default();
        assert!(map.bind("save", "s"));
        assert!(!map.bind("jump", "space"));
        assert_eq!(
            map.translate("s"),
            Some(InputEvent::Key("save".to_string()))
        );
        assert_eq!(map.translate("F5"), None);
    }
}
