//! Action documents, embedded in entity and gear definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::stats::DamageKind;

fn one() -> i32 {
    1
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MoveDef {
    pub name: String,
    pub sounds: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BasicAttackDef {
    pub name: String,
    pub ap: i32,
    pub damage: i32,
    #[serde(default)]
    pub strength: i32,
    #[serde(default)]
    pub kind: DamageKind,
    #[serde(default = "one")]
    pub range: i32,
    /// Uses before the action is spent; 0 is unlimited.
    #[serde(default)]
    pub ammo: i32,
    /// Conditions applied to the defender on a hit.
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub sounds: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AoeAttackDef {
    pub name: String,
    pub ap: i32,
    pub damage: i32,
    #[serde(default)]
    pub strength: i32,
    #[serde(default)]
    pub kind: DamageKind,
    pub range: i32,
    /// Side of the square blast centred on the target cell.
    #[serde(default = "one")]
    pub diameter: i32,
    #[serde(default)]
    pub ammo: i32,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub sounds: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InteractDef {
    pub name: String,
    #[serde(default)]
    pub ap: i32,
    #[serde(default = "one")]
    pub range: i32,
    #[serde(default)]
    pub sounds: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SummonDef {
    pub name: String,
    pub ap: i32,
    /// Entity definition to summon.
    pub ent: String,
    #[serde(default = "one")]
    pub range: i32,
    #[serde(default)]
    pub ammo: i32,
    /// Target cell must be in the summoner's own sight.
    #[serde(default)]
    pub personal_los: bool,
    #[serde(default)]
    pub animation: String,
    #[serde(default)]
    pub sounds: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionDef {
    Move(MoveDef),
    BasicAttack(BasicAttackDef),
    AoeAttack(AoeAttackDef),
    Interact(InteractDef),
    Summon(SummonDef),
}

impl ActionDef {
    pub fn name(&self) -> &str {
        match self {
            Self::Move(d) => &d.name,
            Self::BasicAttack(d) => &d.name,
            Self::AoeAttack(d) => &d.name,
            Self::Interact(d) => &d.name,
            Self::Summon(d) => &d.name,
        }
    }
}
