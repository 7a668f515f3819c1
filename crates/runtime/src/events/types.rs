use haunts_core::{ActionExec, Side, TurnState};

/// Turn state machine notifications.
#[derive(Clone, Debug, PartialEq)]
pub enum TurnEvent {
    StateChanged {
        turn: u32,
        side: Side,
        from: TurnState,
        to: TurnState,
    },
    /// An exec failed validation and was dropped.
    ExecRejected { exec: ActionExec, reason: String },
    /// A script callback aborted. The round carries on without it.
    ScriptFailed { callback: String, message: String },
    Saved { slot: String },
    Loaded { slot: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetEvent {
    UpdateSent { round: u32 },
    CaughtUp { round: u32 },
    Failed(String),
}
