//! ActionExec: the replay unit, and its canonical encoding.
//!
//! An exec names the entity, the index of the action in its action list and
//! a kind-specific payload. On the wire every exec is an [`EncodedExec`]: the
//! kind tag plus the bincode body of that kind's payload struct. Decoding
//! goes through an [`ExecRegistry`], and a tag without a registered decoder
//! is fatal to the replay.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::ExecCodecError;
use crate::entity::EntityId;
use crate::geom::BoardPos;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MoveExec {
    /// Cells to walk through, excluding the start cell.
    pub path: Vec<BoardPos>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttackExec {
    pub target: EntityId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AoeExec {
    pub pos: BoardPos,
    /// Entities in the blast, ascending by id.
    pub targets: Vec<EntityId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractTarget {
    Door { room: usize, door: usize },
    Entity(EntityId),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InteractExec {
    pub target: InteractTarget,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SummonExec {
    pub pos: BoardPos,
}

/// Readies the action instead of performing it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyExec;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecPayload {
    Move(MoveExec),
    BasicAttack(AttackExec),
    AoeAttack(AoeExec),
    Interact(InteractExec),
    Summon(SummonExec),
    Ready(ReadyExec),
}

impl ExecPayload {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Move(_) => "Move",
            Self::BasicAttack(_) => "BasicAttack",
            Self::AoeAttack(_) => "AoeAttack",
            Self::Interact(_) => "Interact",
            Self::Summon(_) => "Summon",
            Self::Ready(_) => "Ready",
        }
    }

    fn encode_body(&self) -> bincode::Result<Vec<u8>> {
        match self {
            Self::Move(p) => bincode::serialize(p),
            Self::BasicAttack(p) => bincode::serialize(p),
            Self::AoeAttack(p) => bincode::serialize(p),
            Self::Interact(p) => bincode::serialize(p),
            Self::Summon(p) => bincode::serialize(p),
            Self::Ready(p) => bincode::serialize(p),
        }
    }
}

macro_rules! payload_from {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for ExecPayload {
            fn from(value: $ty) -> Self {
                Self::$variant(value)
            }
        })*
    };
}

payload_from! {
    MoveExec => Move,
    AttackExec => BasicAttack,
    AoeExec => AoeAttack,
    InteractExec => Interact,
    SummonExec => Summon,
    ReadyExec => Ready,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActionExec {
    pub ent: EntityId,
    /// Index into the entity's action list.
    pub index: usize,
    pub payload: ExecPayload,
}

impl ActionExec {
    pub fn new(ent: EntityId, index: usize, payload: impl Into<ExecPayload>) -> Self {
        Self {
            ent,
            index,
            payload: payload.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }

    pub fn path(&self) -> Option<&[BoardPos]> {
        match &self.payload {
            ExecPayload::Move(m) => Some(&m.path),
            _ => None,
        }
    }

    /// Keeps only the first `keep` steps of a move. Other kinds are untouched.
    pub fn truncate_path(&mut self, keep: usize) {
        if let ExecPayload::Move(m) = &mut self.payload {
            m.path.truncate(keep);
        }
    }
}

/// Wire form of an exec.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedExec {
    pub ent: EntityId,
    pub index: usize,
    pub kind: String,
    pub body: Vec<u8>,
}

type Decoder = fn(&[u8]) -> bincode::Result<ExecPayload>;

fn decode_as<T>(body: &[u8]) -> bincode::Result<ExecPayload>
where
    T: DeserializeOwned + Into<ExecPayload>,
{
    bincode::deserialize::<T>(body).map(Into::into)
}

/// Kind tag to payload decoder.
#[derive(Clone, Debug)]
pub struct ExecRegistry {
    decoders: BTreeMap<&'static str, Decoder>,
}

impl Default for ExecRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl ExecRegistry {
    pub fn empty() -> Self {
        Self {
            decoders: BTreeMap::new(),
        }
    }

    /// Registry with every built-in exec kind.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register::<MoveExec>("Move");
        registry.register::<AttackExec>("BasicAttack");
        registry.register::<AoeExec>("AoeAttack");
        registry.register::<InteractExec>("Interact");
        registry.register::<SummonExec>("Summon");
        registry.register::<ReadyExec>("Ready");
        registry
    }

    pub fn register<T>(&mut self, kind: &'static str)
    where
        T: DeserializeOwned + Into<ExecPayload>,
    {
        self.decoders.insert(kind, decode_as::<T>);
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.decoders.contains_key(kind)
    }

    pub fn encode(&self, exec: &ActionExec) -> Result<EncodedExec, ExecCodecError> {
        let kind = exec.kind();
        if !self.is_registered(kind) {
            return Err(ExecCodecError::Unregistered(kind.to_string()));
        }
        let body = exec
            .payload
            .encode_body()
            .map_err(|e| ExecCodecError::Encode(e.to_string()))?;
        Ok(EncodedExec {
            ent: exec.ent,
            index: exec.index,
            kind: kind.to_string(),
            body,
        })
    }

    pub fn decode(&self, encoded: &EncodedExec) -> Result<ActionExec, ExecCodecError> {
        let decoder = self
            .decoders
            .get(encoded.kind.as_str())
            .ok_or_else(|| ExecCodecError::Unregistered(encoded.kind.clone()))?;
        let payload = decoder(&encoded.body).map_err(|e| ExecCodecError::Decode {
            kind: encoded.kind.clone(),
            reason: e.to_string(),
        })?;
        Ok(ActionExec {
            ent: encoded.ent,
            index: encoded.index,
            payload,
        })
    }

    /// Encodes an exec stream as one blob.
    pub fn encode_all(&self, execs: &[ActionExec]) -> Result<Vec<u8>, ExecCodecError> {
        let encoded = execs
            .iter()
            .map(|exec| self.encode(exec))
            .collect::<Result<Vec<_>, _>>()?;
        bincode::serialize(&encoded).map_err(|e| ExecCodecError::Encode(e.to_string()))
    }

    pub fn decode_all(&self, bytes: &[u8]) -> Result<Vec<ActionExec>, ExecCodecError> {
        let encoded: Vec<EncodedExec> =
            bincode::deserialize(bytes).map_err(|e| ExecCodecError::Decode {
                kind: "stream".to_string(),
                reason: e.to_string(),
            })?;
        encoded.iter().map(|e| self.decode(e)).collect()
    }
}
