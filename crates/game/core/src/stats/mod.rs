//! Entity stats and the damage model.

mod conditions;

pub use conditions::{
    ActiveCondition, Buff, Condition, ConditionDef, DamageKind, Modifiable, Resistance,
    RoundEffect, StatKind, builtin_conditions,
};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Base values from an entity definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BaseStats {
    pub hp_max: i32,
    pub ap_max: i32,
    pub corpus: i32,
    pub ego: i32,
    pub attack: i32,
    pub defense: i32,
}

impl Default for BaseStats {
    fn default() -> Self {
        Self {
            hp_max: 10,
            ap_max: 10,
            corpus: 5,
            ego: 5,
            attack: 0,
            defense: 0,
        }
    }
}

/// Outcome of [`Stats::apply_damage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DamageOutcome {
    pub dealt: i32,
    pub killed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    base: BaseStats,
    hp_cur: i32,
    ap_cur: i32,
    conditions: BTreeMap<String, ActiveCondition>,
}

impl Stats {
    pub fn new(base: BaseStats) -> Self {
        Self {
            hp_cur: base.hp_max,
            ap_cur: base.ap_max,
            base,
            conditions: BTreeMap::new(),
        }
    }

    fn modified(&self, base: i32, what: Modifiable) -> i32 {
        self.conditions
            .values()
            .fold(base, |value, c| c.modify_base(value, what))
    }

    pub fn hp_cur(&self) -> i32 {
        self.hp_cur
    }

    pub fn hp_max(&self) -> i32 {
        self.base.hp_max
    }

    pub fn ap_cur(&self) -> i32 {
        self.ap_cur
    }

    pub fn ap_max(&self) -> i32 {
        self.modified(self.base.ap_max, Modifiable::Stat(StatKind::ApMax))
            .max(0)
    }

    pub fn corpus(&self) -> i32 {
        self.modified(self.base.corpus, Modifiable::Stat(StatKind::Corpus))
    }

    pub fn ego(&self) -> i32 {
        self.modified(self.base.ego, Modifiable::Stat(StatKind::Ego))
    }

    pub fn attack(&self) -> i32 {
        self.modified(self.base.attack, Modifiable::Stat(StatKind::Attack))
    }

    pub fn defense(&self) -> i32 {
        self.modified(self.base.defense, Modifiable::Stat(StatKind::Defense))
    }

    pub fn is_dead(&self) -> bool {
        self.hp_cur <= 0
    }

    pub fn set_hp(&mut self, hp: i32) {
        self.hp_cur = hp.min(self.base.hp_max);
    }

    pub fn set_ap(&mut self, ap: i32) {
        self.ap_cur = ap.clamp(0, self.ap_max());
    }

    /// Debits `cost` when affordable.
    pub fn spend_ap(&mut self, cost: i32) -> bool {
        if cost > self.ap_cur {
            return false;
        }
        self.ap_cur -= cost;
        true
    }

    pub fn refresh_ap(&mut self) {
        self.ap_cur = self.ap_max();
    }

    /// Fresh entities start at full HP and AP.
    pub fn on_begin(&mut self) {
        self.hp_cur = self.base.hp_max;
        self.refresh_ap();
    }

    pub fn conditions(&self) -> impl Iterator<Item = &ActiveCondition> {
        self.conditions.values()
    }

    pub fn has_condition(&self, name: &str) -> bool {
        self.conditions.contains_key(name)
    }

    /// Applies a condition. A same-named condition keeps the stronger of the
    /// two and restarts its countdown.
    pub fn apply_condition(&mut self, def: ConditionDef) {
        match self.conditions.get_mut(&def.name) {
            Some(existing) if existing.strength() > def.strength => {
                existing.remaining = existing.def.duration;
            }
            _ => {
                self.conditions
                    .insert(def.name.clone(), ActiveCondition::new(def));
            }
        }
    }

    pub fn remove_condition(&mut self, name: &str) -> bool {
        self.conditions.remove(name).is_some()
    }

    /// Reduces HP after resistances; never heals.
    pub fn apply_damage(&mut self, amount: i32, kind: DamageKind) -> DamageOutcome {
        let was_alive = !self.is_dead();
        let dealt = self.modified(amount, Modifiable::Damage(kind)).max(0);
        self.hp_cur -= dealt;
        DamageOutcome {
            dealt,
            killed: was_alive && self.is_dead(),
        }
    }

    /// Round boundary: every condition ticks once, then its damage lands.
    pub fn on_round(&mut self) -> Vec<DamageOutcome> {
        let mut pending = Vec::new();
        self.conditions.retain(|_, condition| {
            let effect = condition.on_round();
            if effect.damage > 0 {
                pending.push((effect.damage, effect.kind));
            }
            effect.keep
        });
        pending
            .into_iter()
            .map(|(damage, kind)| self.apply_damage(damage, kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin(name: &str) -> ConditionDef {
        builtin_conditions()
            .into_iter()
            .find(|c| c.name == name)
            .unwrap()
    }

    fn hundred_hp() -> Stats {
        Stats::new(BaseStats {
            hp_max: 100,
            attack: 3,
            ..BaseStats::default()
        })
    }

    #[test]
    fn fire_debuff_burns_three_rounds_then_expires() {
        let mut stats = hundred_hp();
        stats.apply_condition(builtin("FireDebuffAttack"));
        for _ in 0..3 {
            stats.on_round();
        }
        assert_eq!(stats.hp_cur(), 97);
        assert!(!stats.has_condition("FireDebuffAttack"));
        stats.on_round();
        assert_eq!(stats.hp_cur(), 97);
    }

    #[test]
    fn identical_names_do_not_stack() {
        let mut stats = hundred_hp();
        stats.apply_condition(builtin("PoisonDebuffAttack"));
        stats.apply_condition(builtin("PoisonDebuffAttack"));
        assert_eq!(stats.attack(), 2);
    }

    #[test]
    fn different_names_same_effect_add_up() {
        let mut stats = hundred_hp();
        stats.apply_condition(builtin("PoisonDebuffAttack"));
        stats.apply_condition(builtin("PoisonDebuffAttack2"));
        assert_eq!(stats.attack(), 1);
    }

    #[test]
    fn stronger_application_wins() {
        let mut stats = hundred_hp();
        let mut strong = builtin("PanicDebuffEgo");
        strong.strength = 3;
        strong.buffs[0].amount = -3;
        stats.apply_condition(strong);
        stats.apply_condition(builtin("PanicDebuffEgo"));
        assert_eq!(stats.ego(), 2);
    }

    #[test]
    fn resistance_applies_before_condition_damage() {
        let mut stats = hundred_hp();
        stats.apply_condition(builtin("FireResistance"));
        stats.apply_condition(builtin("FireDebuffAttack"));
        stats.on_round();
        assert_eq!(stats.hp_cur(), 100);
    }

    #[test]
    fn exact_ap_cost_leaves_zero() {
        let mut stats = hundred_hp();
        assert!(stats.spend_ap(10));
        assert_eq!(stats.ap_cur(), 0);
        assert!(!stats.spend_ap(1));
    }

    #[test]
    fn lethal_damage_reports_kill_once() {
        let mut stats = Stats::new(BaseStats::default());
        let first = stats.apply_damage(12, DamageKind::Brutal);
        assert!(first.killed);
        assert!(stats.is_dead());
        assert!(!stats.apply_damage(1, DamageKind::Brutal).killed);
    }
}
