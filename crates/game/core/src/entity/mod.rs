//! Entities: definitions plus the mutable instance state.

mod def;

pub use def::{EntityDef, ExplorerDef, GearDef, HauntDef, HauntLevel, NpcDef, ObjectDef};

use core::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::config::GameConfig;
use crate::geom::{BoardPos, BoardRect};
use crate::los::LosData;
use crate::stats::Stats;

/// Opaque id allocated from the game's counter; never reused.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::IntoStaticStr,
)]
pub enum Side {
    Intruders,
    Denizens,
    Npc,
    Object,
}

impl Side {
    /// Accepts the names scripts use, in any case.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "intruders" | "explorers" => Some(Self::Intruders),
            "denizens" | "haunt" => Some(Self::Denizens),
            "npc" => Some(Self::Npc),
            "object" => Some(Self::Object),
            _ => None,
        }
    }

    /// The other playing side. Non-playing sides have no opponent.
    pub const fn opponent(self) -> Option<Self> {
        match self {
            Self::Intruders => Some(Self::Denizens),
            Self::Denizens => Some(Self::Intruders),
            _ => None,
        }
    }

    pub const fn is_playing(self) -> bool {
        matches!(self, Self::Intruders | Self::Denizens)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct EntityFlags: u8 {
        const SELECTED = 1 << 0;
        const HOVERED = 1 << 1;
        const CONTROLLED = 1 << 2;
        const DEAD = 1 << 3;
        /// Object entities that have been interacted with.
        const USED = 1 << 4;
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityInfo {
    pub last_ent_that_attacked_me: Option<EntityId>,
    pub last_ent_that_i_attacked: Option<EntityId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub def: EntityDef,
    pub pos: BoardPos,
    /// Interpolated position while moving; equals `pos` at rest.
    pub fpos: (f64, f64),
    pub facing: u8,
    pub flags: EntityFlags,
    pub actions: Vec<Action>,
    pub current_action: Option<usize>,
    /// Readied action index, fired as an interrupt on the opponent's turn.
    pub ready: Option<usize>,
    pub stats: Stats,
    pub info: EntityInfo,
    pub gear: Option<String>,
    #[serde(skip)]
    pub los: Option<LosData>,
}

impl Entity {
    pub fn from_def(id: EntityId, def: EntityDef) -> Self {
        let actions = def.actions.iter().cloned().map(Action::from_def).collect();
        let los = def.side().is_playing().then(LosData::default);
        Self {
            id,
            stats: Stats::new(def.base.clone()),
            def,
            pos: BoardPos::default(),
            fpos: (0.0, 0.0),
            facing: 0,
            flags: EntityFlags::empty(),
            actions,
            current_action: None,
            ready: None,
            info: EntityInfo::default(),
            gear: None,
            los,
        }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn side(&self) -> Side {
        self.def.side()
    }

    pub fn is_alive(&self) -> bool {
        !self.flags.contains(EntityFlags::DEAD) && !self.stats.is_dead()
    }

    pub fn sight(&self, config: &GameConfig) -> i32 {
        self.def.sight.unwrap_or(config.default_sight)
    }

    pub fn walking_speed(&self, config: &GameConfig) -> f64 {
        self.def
            .walking_speed
            .unwrap_or(config.default_walking_speed)
    }

    pub fn footprint(&self) -> BoardRect {
        Self::footprint_at(&self.def, self.pos)
    }

    pub fn footprint_at(def: &EntityDef, pos: BoardPos) -> BoardRect {
        BoardRect::new(pos.x, pos.y, def.dx.max(1), def.dy.max(1))
    }

    pub fn set_pos(&mut self, pos: BoardPos) {
        self.pos = pos;
        self.fpos = (pos.x as f64, pos.y as f64);
    }

    /// Any cell of `rect` visible to this entity.
    pub fn has_los(&self, rect: &BoardRect) -> bool {
        self.los.as_ref().is_some_and(|los| los.any_in(rect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_follows_sub_def() {
        let mut def = EntityDef::new("Teacher");
        assert_eq!(def.side(), Side::Npc);
        def.haunt = Some(HauntDef::default());
        assert_eq!(def.side(), Side::Denizens);
        assert!(def.is_minion());
        def.explorer = Some(ExplorerDef::default());
        assert_eq!(def.side(), Side::Intruders);
    }

    #[test]
    fn only_playing_sides_get_los() {
        let mut def = EntityDef::new("Candle");
        def.object = Some(ObjectDef::default());
        assert!(Entity::from_def(EntityId(1), def).los.is_none());

        let mut def = EntityDef::new("Occultist");
        def.explorer = Some(ExplorerDef::default());
        assert!(Entity::from_def(EntityId(2), def).los.is_some());
    }

    #[test]
    fn script_side_names() {
        assert_eq!(Side::parse("Haunt"), Some(Side::Denizens));
        assert_eq!(Side::parse("explorers"), Some(Side::Intruders));
        assert_eq!(Side::parse("ghosts"), None);
        assert_eq!(Side::Denizens.opponent(), Some(Side::Intruders));
    }
}
