//! Topic-based event bus for runtime events.
//!
//! Everything the core queues on its outbox is republished here once per
//! frame, next to the runtime's own turn and network notifications.
//! Consumers subscribe only to the topics they draw, play or log.

mod bus;
mod types;

pub use bus::{Event, EventBus, Topic};
pub use types::{NetEvent, TurnEvent};
