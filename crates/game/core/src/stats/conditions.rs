//! Conditions: timed or permanent status effects on an entity.
//!
//! A condition is data ([`ConditionDef`]) plus a countdown. Applied
//! conditions are keyed by name, so re-applying the same name never stacks:
//! the stronger application wins and the countdown is refreshed. Conditions
//! with different names stack additively even when they touch the same stat.

use serde::{Deserialize, Serialize};

/// Damage-type tag.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum DamageKind {
    Fire,
    Poison,
    Panic,
    Brutal,
    #[default]
    Unspecified,
}

impl DamageKind {
    /// Mental damage is defended by Ego, everything else by Corpus.
    pub const fn is_mental(self) -> bool {
        matches!(self, Self::Panic)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum StatKind {
    Attack,
    Defense,
    Corpus,
    Ego,
    ApMax,
}

/// What a condition may modify.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Modifiable {
    Stat(StatKind),
    /// Incoming damage of a kind (resistances).
    Damage(DamageKind),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Buff {
    pub stat: StatKind,
    pub amount: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resistance {
    pub kind: DamageKind,
    pub amount: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConditionDef {
    pub name: String,
    #[serde(default)]
    pub kind: DamageKind,
    #[serde(default)]
    pub strength: i32,
    #[serde(default)]
    pub buffs: Vec<Buff>,
    #[serde(default)]
    pub resistances: Vec<Resistance>,
    /// Damage dealt at each round boundary.
    #[serde(default)]
    pub damage_per_round: i32,
    /// Rounds before expiry; `None` never expires.
    #[serde(default)]
    pub duration: Option<u32>,
}

impl ConditionDef {
    fn new(name: &str, kind: DamageKind) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            strength: 1,
            buffs: Vec::new(),
            resistances: Vec::new(),
            damage_per_round: 0,
            duration: None,
        }
    }

    fn buff(mut self, stat: StatKind, amount: i32) -> Self {
        self.buffs.push(Buff { stat, amount });
        self
    }

    fn dot(mut self, damage: i32) -> Self {
        self.damage_per_round = damage;
        self
    }

    fn rounds(mut self, rounds: u32) -> Self {
        self.duration = Some(rounds);
        self
    }

    fn resist(mut self, kind: DamageKind, amount: i32) -> Self {
        self.resistances.push(Resistance { kind, amount });
        self
    }
}

/// Conditions every game knows without loading data.
pub fn builtin_conditions() -> Vec<ConditionDef> {
    use DamageKind::*;
    use StatKind::*;
    vec![
        ConditionDef::new("FireDebuffAttack", Fire)
            .buff(Attack, -1)
            .dot(1)
            .rounds(3),
        ConditionDef::new("PoisonDebuffAttack", Poison)
            .buff(Attack, -1)
            .rounds(3),
        ConditionDef::new("PoisonDebuffAttack2", Poison)
            .buff(Attack, -1)
            .rounds(3),
        ConditionDef::new("PanicDebuffEgo", Panic).buff(Ego, -1).rounds(2),
        ConditionDef::new("Brutalized", Brutal).buff(Defense, -2).rounds(1),
        ConditionDef::new("FireResistance", Unspecified).resist(Fire, 1),
    ]
}

/// Effect of one round boundary on a condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundEffect {
    pub keep: bool,
    pub damage: i32,
    pub kind: DamageKind,
}

pub trait Condition {
    fn name(&self) -> &str;
    fn strength(&self) -> i32;
    fn kind(&self) -> DamageKind;
    fn modify_base(&self, base: i32, what: Modifiable) -> i32;
    fn on_round(&mut self) -> RoundEffect;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveCondition {
    pub def: ConditionDef,
    pub remaining: Option<u32>,
}

impl ActiveCondition {
    pub fn new(def: ConditionDef) -> Self {
        let remaining = def.duration;
        Self { def, remaining }
    }
}

impl Condition for ActiveCondition {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn strength(&self) -> i32 {
        self.def.strength
    }

    fn kind(&self) -> DamageKind {
        self.def.kind
    }

    fn modify_base(&self, base: i32, what: Modifiable) -> i32 {
        match what {
            Modifiable::Stat(stat) => {
                base + self
                    .def
                    .buffs
                    .iter()
                    .filter(|b| b.stat == stat)
                    .map(|b| b.amount)
                    .sum::<i32>()
            }
            Modifiable::Damage(kind) => {
                let resisted: i32 = self
                    .def
                    .resistances
                    .iter()
                    .filter(|r| r.kind == kind)
                    .map(|r| r.amount)
                    .sum();
                (base - resisted).max(0)
            }
        }
    }

    fn on_round(&mut self) -> RoundEffect {
        let keep = match self.remaining.as_mut() {
            Some(rounds) => {
                *rounds = rounds.saturating_sub(1);
                *rounds > 0
            }
            None => true,
        };
        RoundEffect {
            keep,
            damage: self.def.damage_per_round,
            kind: self.def.kind,
        }
    }
}
