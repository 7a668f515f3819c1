//! Moving values across the rhai boundary.

use haunts_core::{BoardPos, EntityId, Side};
use rhai::{Dynamic, EvalAltResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub type RhaiResult<T> = Result<T, Box<EvalAltResult>>;

pub fn arg<T: DeserializeOwned>(value: &Dynamic, what: &str) -> RhaiResult<T> {
    rhai::serde::from_dynamic(value).map_err(|e| format!("bad {what}: {e}").into())
}

pub fn to_dyn<T: Serialize>(value: &T) -> RhaiResult<Dynamic> {
    rhai::serde::to_dynamic(value)
}

pub fn to_json(value: &Dynamic) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

pub fn pos(value: &Dynamic) -> RhaiResult<BoardPos> {
    arg(value, "point")
}

pub fn ent(id: i64) -> RhaiResult<EntityId> {
    u32::try_from(id)
        .map(EntityId)
        .map_err(|_| format!("bad entity handle {id}").into())
}

pub fn side(name: &str) -> RhaiResult<Side> {
    Side::parse(name).ok_or_else(|| format!("unknown side {name:?}").into())
}

pub fn count(n: i64, what: &str) -> RhaiResult<usize> {
    usize::try_from(n).map_err(|_| format!("{what} must not be negative").into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_use_capitalised_fields() {
        let mut map = rhai::Map::new();
        map.insert("X".into(), Dynamic::from_int(4));
        map.insert("Y".into(), Dynamic::from_int(7));
        assert_eq!(pos(&Dynamic::from_map(map)).unwrap(), BoardPos::new(4, 7));
    }

    #[test]
    fn negative_handles_are_rejected() {
        assert!(ent(-1).is_err());
        assert_eq!(ent(3).unwrap(), EntityId(3));
    }
}
