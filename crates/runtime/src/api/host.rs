//! Collaborators the host supplies: dialogs, placement, camera and audio.
//!
//! The runtime calls these on the game thread. Headless implementations
//! resolve every prompt immediately so the game runs without a window.
use haunts_core::{BoardPos, EntityId, MusicCommand};
use serde_json::Value;
use tracing::{debug, info};

/// Roster placement prompt opened by `PlaceEntities`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacementRequest {
    /// Entity names the player may place, in roster order.
    pub roster: Vec<String>,
    /// Free cells inside the matching spawn points, row-major per spawn.
    pub cells: Vec<BoardPos>,
    pub min: usize,
    pub max: usize,
}

pub trait Ui: Send {
    /// Shows a dialog and returns the choices the player picked.
    fn dialog(&mut self, path: &str, args: &Value) -> Vec<String>;

    fn pick_from_n(&mut self, min: usize, max: usize, options: &[String]) -> Vec<String>;

    fn chooser_from_file(&mut self, path: &str) -> Vec<String>;

    /// Chosen (name, cell) pairs; the runtime validates each before placing.
    fn place_entities(&mut self, request: &PlacementRequest) -> Vec<(String, BoardPos)>;

    fn focus(&mut self, _pos: BoardPos) {}

    fn zoom(&mut self, _zoom: f64) {}

    fn show_main_bar(&mut self, _show: bool) {}

    /// Drops every overlay widget, ahead of a restored game.
    fn clear_overlays(&mut self) {}
}

pub trait Audio: Send {
    fn play_sound(&mut self, name: &str, ent: Option<EntityId>);

    fn music(&mut self, command: &MusicCommand);
}

/// Picks first choices and places rosters front to back.
#[derive(Debug, Default)]
pub struct HeadlessUi;

impl Ui for HeadlessUi {
    fn dialog(&mut self, path: &str, args: &Value) -> Vec<String> {
        let choice = args
            .get("Choices")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .and_then(Value::as_str)
            .map(str::to_owned);
        info!(target: "runtime::ui", path, ?choice, "dialog answered");
        choice.into_iter().collect()
    }

    fn pick_from_n(&mut self, min: usize, max: usize, options: &[String]) -> Vec<String> {
        let take = min.max(1).min(max).min(options.len());
        options[..take].to_vec()
    }

    fn chooser_from_file(&mut self, path: &str) -> Vec<String> {
        debug!(target: "runtime::ui", path, "chooser has no headless answer");
        Vec::new()
    }

    fn place_entities(&mut self, request: &PlacementRequest) -> Vec<(String, BoardPos)> {
        request
            .roster
            .iter()
            .take(request.max)
            .zip(&request.cells)
            .map(|(name, &pos)| (name.clone(), pos))
            .collect()
    }
}

/// Logs requests instead of playing them.
#[derive(Debug, Default)]
pub struct HeadlessAudio;

impl Audio for HeadlessAudio {
    fn play_sound(&mut self, name: &str, ent: Option<EntityId>) {
        debug!(target: "runtime::audio", sound = name, ?ent, "sound");
    }

    fn music(&mut self, command: &MusicCommand) {
        debug!(target: "runtime::audio", ?command, "music");
    }
}
