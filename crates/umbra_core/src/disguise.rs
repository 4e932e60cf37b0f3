//! # Disguise Table
//!
//! Decides what a hidden voxel looks like to a client.
//!
//! ## Resolution Order
//!
//! For `disguise_for(real, y)`:
//!
//! 1. A rule for `real` restricted to the stratum containing `y`
//! 2. A rule for `real` with no stratum restriction
//! 3. The background of the stratum containing `y`
//! 4. The table's default background
//!
//! The table is built once at startup and never mutated.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ShadowError, ShadowResult};
use crate::voxel::VoxelType;

/// A vertical band with its own background material.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StratumConfig {
    /// Name referenced by rules.
    pub name: String,
    /// Lowest Y inside the band (inclusive).
    pub min_y: i32,
    /// Highest Y inside the band (inclusive).
    pub max_y: i32,
    /// What an unmapped sensitive voxel turns into inside this band.
    pub background: VoxelType,
}

/// A single disguise rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// The sensitive voxel type.
    pub real: VoxelType,
    /// What clients see instead.
    pub disguise: VoxelType,
    /// Strata the rule applies to. Empty means every stratum.
    #[serde(default)]
    pub strata: Vec<String>,
}

/// The `[disguise]` section of the config file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisguiseConfig {
    /// Fallback when `y` falls outside every stratum.
    #[serde(default = "default_background")]
    pub default_background: VoxelType,
    /// Vertical bands.
    #[serde(default)]
    pub strata: Vec<StratumConfig>,
    /// Disguise rules; any type named here is sensitive.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

fn default_background() -> VoxelType {
    VoxelType::STONE
}

impl Default for DisguiseConfig {
    fn default() -> Self {
        Self {
            default_background: default_background(),
            strata: Vec::new(),
            rules: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
struct Stratum {
    min_y: i32,
    max_y: i32,
    background: VoxelType,
}

#[derive(Clone, Copy, Debug)]
struct Rule {
    /// `None` applies to every stratum.
    stratum: Option<usize>,
    disguise: VoxelType,
}

/// Immutable mapping `(real type, stratum) -> disguise type`.
#[derive(Clone, Debug)]
pub struct DisguiseTable {
    default_background: VoxelType,
    strata: Vec<Stratum>,
    rules: HashMap<VoxelType, Vec<Rule>>,
}

impl DisguiseTable {
    /// Builds the table from its config section.
    ///
    /// # Errors
    ///
    /// Returns [`ShadowError::InvalidConfig`] if a stratum is inverted, two
    /// strata share a name, or a rule names an unknown stratum.
    pub fn from_config(config: &DisguiseConfig) -> ShadowResult<Self> {
        let mut names: HashMap<&str, usize> = HashMap::with_capacity(config.strata.len());
        let mut strata = Vec::with_capacity(config.strata.len());

        for (i, s) in config.strata.iter().enumerate() {
            if s.min_y > s.max_y {
                return Err(ShadowError::InvalidConfig(format!(
                    "stratum '{}' has min_y {} above max_y {}",
                    s.name, s.min_y, s.max_y
                )));
            }
            if names.insert(s.name.as_str(), i).is_some() {
                return Err(ShadowError::InvalidConfig(format!(
                    "duplicate stratum '{}'",
                    s.name
                )));
            }
            strata.push(Stratum {
                min_y: s.min_y,
                max_y: s.max_y,
                background: s.background,
            });
        }

        let mut rules: HashMap<VoxelType, Vec<Rule>> = HashMap::new();
        for r in &config.rules {
            let entry = rules.entry(r.real).or_default();
            if r.strata.is_empty() {
                entry.push(Rule {
                    stratum: None,
                    disguise: r.disguise,
                });
                continue;
            }
            for name in &r.strata {
                let Some(&index) = names.get(name.as_str()) else {
                    return Err(ShadowError::InvalidConfig(format!(
                        "rule for voxel {} names unknown stratum '{name}'",
                        r.real.id()
                    )));
                };
                entry.push(Rule {
                    stratum: Some(index),
                    disguise: r.disguise,
                });
            }
        }

        Ok(Self {
            default_background: config.default_background,
            strata,
            rules,
        })
    }

    /// A table with no sensitive types. Nothing is ever hidden.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            default_background: default_background(),
            strata: Vec::new(),
            rules: HashMap::new(),
        }
    }

    /// Returns true if `real` has at least one disguise rule.
    ///
    /// Only sensitive voxels are ever hidden.
    #[inline]
    #[must_use]
    pub fn is_sensitive(&self, real: VoxelType) -> bool {
        self.rules.contains_key(&real)
    }

    /// Number of sensitive voxel types.
    #[must_use]
    pub fn sensitive_count(&self) -> usize {
        self.rules.len()
    }

    fn stratum_at(&self, y: i32) -> Option<usize> {
        self.strata.iter().position(|s| (s.min_y..=s.max_y).contains(&y))
    }

    /// The voxel type shown in place of a hidden `real` at height `y`.
    #[must_use]
    pub fn disguise_for(&self, real: VoxelType, y: i32) -> VoxelType {
        let stratum = self.stratum_at(y);

        if let Some(rules) = self.rules.get(&real) {
            if let Some(rule) = rules.iter().find(|r| r.stratum.is_some() && r.stratum == stratum) {
                return rule.disguise;
            }
            if let Some(rule) = rules.iter().find(|r| r.stratum.is_none()) {
                return rule.disguise;
            }
        }

        stratum.map_or(self.default_background, |i| self.strata[i].background)
    }
}

impl Default for DisguiseTable {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEEPSLATE: VoxelType = VoxelType(2);
    const DIAMOND: VoxelType = VoxelType(56);
    const EMERALD: VoxelType = VoxelType(129);
    const NETHERRACK: VoxelType = VoxelType(87);

    fn config() -> DisguiseConfig {
        DisguiseConfig {
            default_background: VoxelType::STONE,
            strata: vec![
                StratumConfig { name: "deep".into(), min_y: -64, max_y: -1, background: DEEPSLATE },
                StratumConfig { name: "surface".into(), min_y: 0, max_y: 319, background: VoxelType::STONE },
            ],
            rules: vec![
                RuleConfig { real: DIAMOND, disguise: DEEPSLATE, strata: vec!["deep".into()] },
                RuleConfig { real: DIAMOND, disguise: NETHERRACK, strata: vec![] },
                RuleConfig { real: EMERALD, disguise: VoxelType::STONE, strata: vec!["surface".into()] },
            ],
        }
    }

    #[test]
    fn test_stratum_rule_wins_over_universal() {
        let table = DisguiseTable::from_config(&config()).unwrap();
        assert_eq!(table.disguise_for(DIAMOND, -10), DEEPSLATE);
        assert_eq!(table.disguise_for(DIAMOND, 40), NETHERRACK);
    }

    #[test]
    fn test_falls_back_to_stratum_background() {
        let table = DisguiseTable::from_config(&config()).unwrap();
        // Emerald only has a surface rule
        assert_eq!(table.disguise_for(EMERALD, -30), DEEPSLATE);
        // Outside every stratum
        assert_eq!(table.disguise_for(EMERALD, -500), VoxelType::STONE);
        // Total over non-sensitive types too
        assert_eq!(table.disguise_for(VoxelType(3), -5), DEEPSLATE);
    }

    #[test]
    fn test_sensitivity() {
        let table = DisguiseTable::from_config(&config()).unwrap();
        assert!(table.is_sensitive(DIAMOND));
        assert!(table.is_sensitive(EMERALD));
        assert!(!table.is_sensitive(VoxelType::STONE));
        assert_eq!(table.sensitive_count(), 2);
        assert!(!DisguiseTable::empty().is_sensitive(DIAMOND));
    }

    #[test]
    fn test_rejects_unknown_stratum() {
        let mut cfg = config();
        cfg.rules.push(RuleConfig { real: DIAMOND, disguise: DEEPSLATE, strata: vec!["sky".into()] });
        assert!(matches!(DisguiseTable::from_config(&cfg), Err(ShadowError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_inverted_stratum() {
        let mut cfg = config();
        cfg.strata[0].min_y = 10;
        assert!(matches!(DisguiseTable::from_config(&cfg), Err(ShadowError::InvalidConfig(_))));
    }
}
