//! Entity and gear documents (`data/entities/*.json`, `data/gear/*.json`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Side;
use crate::action::ActionDef;
use crate::stats::BaseStats;

fn one() -> i32 {
    1
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum HauntLevel {
    #[default]
    Minion,
    Servitor,
    Master,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ExplorerDef {
    /// Gear names this explorer may be equipped with.
    pub gear: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HauntDef {
    pub level: HauntLevel,
    /// Placement cost when the denizens pick their roster.
    pub cost: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ObjectDef {
    /// Objects flagged as goals are what intruders come to collect.
    pub goal: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NpcDef {}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EntityDef {
    pub name: String,
    #[serde(default)]
    pub sprite: String,
    #[serde(default)]
    pub walking_speed: Option<f64>,
    #[serde(default)]
    pub sight: Option<i32>,
    #[serde(default = "one")]
    pub dx: i32,
    #[serde(default = "one")]
    pub dy: i32,
    #[serde(default)]
    pub base: BaseStats,
    #[serde(default)]
    pub actions: Vec<ActionDef>,
    #[serde(default)]
    pub explorer: Option<ExplorerDef>,
    #[serde(default)]
    pub haunt: Option<HauntDef>,
    #[serde(default)]
    pub object: Option<ObjectDef>,
    #[serde(default)]
    pub npc: Option<NpcDef>,
    /// AI script bound to every instance of this def.
    #[serde(default)]
    pub ai: Option<String>,
    #[serde(default)]
    pub sounds: BTreeMap<String, String>,
}

impl EntityDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sprite: String::new(),
            walking_speed: None,
            sight: None,
            dx: 1,
            dy: 1,
            base: BaseStats::default(),
            actions: Vec::new(),
            explorer: None,
            haunt: None,
            object: None,
            npc: None,
            ai: None,
            sounds: BTreeMap::new(),
        }
    }

    /// Side follows from whichever sub-def is set.
    pub fn side(&self) -> Side {
        if self.explorer.is_some() {
            Side::Intruders
        } else if self.haunt.is_some() {
            Side::Denizens
        } else if self.object.is_some() {
            Side::Object
        } else {
            Side::Npc
        }
    }

    pub fn is_minion(&self) -> bool {
        self.haunt
            .as_ref()
            .is_some_and(|h| h.level == HauntLevel::Minion)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GearDef {
    pub name: String,
    #[serde(default)]
    pub action: Option<ActionDef>,
    #[serde(default)]
    pub condition: Option<String>,
}
