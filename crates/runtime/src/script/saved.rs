//! `SaveGameState` strings: game and script store in one payload.
//!
//! The payload is bincode over the encoded game bytes and the store as
//! JSON text, then base64 so it can sit inside JSON or travel to a peer.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use haunts_core::{Game, Registries};
use serde::{Deserialize, Serialize};

use super::error::ScriptError;

#[derive(Serialize, Deserialize)]
struct SavedGame {
    game: Vec<u8>,
    store: String,
}

pub fn encode_saved(game: &Game, store: &str) -> Result<String, ScriptError> {
    let saved = SavedGame {
        game: game
            .to_bytes()
            .map_err(|e| ScriptError::SavedState(e.to_string()))?,
        store: store.to_owned(),
    };
    let bytes =
        bincode::serialize(&saved).map_err(|e| ScriptError::SavedState(e.to_string()))?;
    Ok(STANDARD.encode(bytes))
}

/// Restored game plus the store JSON.
pub fn decode_saved(
    encoded: &str,
    registries: Arc<Registries>,
) -> Result<(Game, String), ScriptError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ScriptError::SavedState(format!("not base64: {e}")))?;
    let saved: SavedGame =
        bincode::deserialize(&bytes).map_err(|e| ScriptError::SavedState(e.to_string()))?;
    let game = Game::from_bytes(&saved.game, registries)
        .map_err(|e| ScriptError::SavedState(e.to_string()))?;
    Ok((game, saved.store))
}

#[cfg(test)]
mod tests {
    use haunts_core::{House, Side};

    use super::*;

    #[test]
    fn store_and_turn_survive_a_save() {
        let registries = Arc::new(Registries::default());
        let mut game = Game::new(House::empty("Empty"), registries.clone(), 7, Side::Denizens);
        game.turn = 4;
        let encoded = encode_saved(&game, r#"{"reloaded":true}"#).unwrap();

        let (restored, store) = decode_saved(&encoded, registries).unwrap();
        assert_eq!(restored.turn, 4);
        assert_eq!(restored.first_side, Side::Denizens);
        assert_eq!(store, r#"{"reloaded":true}"#);
    }

    #[test]
    fn garbage_is_rejected() {
        let err = decode_saved("%%%", Arc::new(Registries::default())).unwrap_err();
        assert!(matches!(err, ScriptError::SavedState(_)));
    }
}
