//! Modification rulesets: the policy bounding one operation.
//!
//! A ruleset controls what a queue may touch (blacklists), how hard it may
//! lean on the simulation loop (batch size, task delay), and which side
//! effects run around a completing pass (hazard clearing, drop removal,
//! lava draining, entity relocation). Rulesets are validated once and are
//! immutable from the moment a queue starts.
//!
//! Operators supply rulesets as YAML documents; every field has a default
//! so a partial document is enough.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use reweave_types::{EntityKind, Material};

/// Default batch size per scheduling quantum.
const DEFAULT_MAX_PER_TASK: u32 = 1000;

/// Default scheduling interval in ticks.
const DEFAULT_TASK_DELAY_TICKS: u64 = 1;

/// Errors raised by ruleset validation or loading.
#[derive(Debug, thiserror::Error)]
pub enum RulesetError {
    /// `max_per_task` must be at least 1.
    #[error("max_per_task must be greater than zero")]
    ZeroBatchSize,

    /// `task_delay_ticks` must be at least 1.
    #[error("task_delay_ticks must be greater than zero")]
    ZeroTaskDelay,

    /// The YAML document failed to parse.
    #[error("ruleset parse error: {0}")]
    Parse(#[from] serde_yml::Error),
}

/// Immutable policy object controlling one modification operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationRuleset {
    /// Materials excluded from any mutation.
    #[serde(default)]
    pub block_blacklist: BTreeSet<Material>,

    /// Entity kinds excluded from any mutation.
    #[serde(default)]
    pub entity_blacklist: BTreeSet<EntityKind>,

    /// Hazard materials cleared from the region before a completing run.
    #[serde(default = "default_remove_blocks")]
    pub remove_blocks: BTreeSet<Material>,

    /// Whether to clear item/xp drops from the region before a
    /// completing run.
    #[serde(default = "default_true")]
    pub remove_drops: bool,

    /// Whether to drain lava from the region after a completing run.
    #[serde(default = "default_true")]
    pub drain_lava: bool,

    /// Whether to relocate living entities out of the region after a
    /// completing run.
    #[serde(default = "default_true")]
    pub move_entities: bool,

    /// Batch size per scheduling quantum. Must be at least 1.
    #[serde(default = "default_max_per_task")]
    pub max_per_task: u32,

    /// Scheduling interval in ticks. Must be at least 1.
    #[serde(default = "default_task_delay_ticks")]
    pub task_delay_ticks: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_per_task() -> u32 {
    DEFAULT_MAX_PER_TASK
}

fn default_task_delay_ticks() -> u64 {
    DEFAULT_TASK_DELAY_TICKS
}

fn default_remove_blocks() -> BTreeSet<Material> {
    [Material::from("fire"), Material::from("tnt")]
        .into_iter()
        .collect()
}

impl Default for ModificationRuleset {
    fn default() -> Self {
        Self {
            block_blacklist: BTreeSet::new(),
            entity_blacklist: BTreeSet::new(),
            remove_blocks: default_remove_blocks(),
            remove_drops: true,
            drain_lava: true,
            move_entities: true,
            max_per_task: DEFAULT_MAX_PER_TASK,
            task_delay_ticks: DEFAULT_TASK_DELAY_TICKS,
        }
    }
}

impl ModificationRuleset {
    /// Check the ruleset's numeric bounds.
    ///
    /// # Errors
    ///
    /// Returns [`RulesetError::ZeroBatchSize`] or
    /// [`RulesetError::ZeroTaskDelay`] if a bound is violated.
    pub const fn validate(&self) -> Result<(), RulesetError> {
        if self.max_per_task == 0 {
            return Err(RulesetError::ZeroBatchSize);
        }
        if self.task_delay_ticks == 0 {
            return Err(RulesetError::ZeroTaskDelay);
        }
        Ok(())
    }

    /// Load and validate a ruleset from a YAML document.
    ///
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RulesetError::Parse`] on malformed YAML, or a validation
    /// error on bad bounds.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, RulesetError> {
        let ruleset: Self = serde_yml::from_str(yaml)?;
        ruleset.validate()?;
        Ok(ruleset)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_ruleset_is_valid() {
        let ruleset = ModificationRuleset::default();
        assert!(ruleset.validate().is_ok());
        assert_eq!(ruleset.max_per_task, 1000);
        assert_eq!(ruleset.task_delay_ticks, 1);
        assert!(ruleset.remove_blocks.contains(&Material::from("fire")));
    }

    #[test]
    fn zero_bounds_are_rejected() {
        let ruleset = ModificationRuleset {
            max_per_task: 0,
            ..ModificationRuleset::default()
        };
        assert!(matches!(
            ruleset.validate(),
            Err(RulesetError::ZeroBatchSize)
        ));

        let ruleset = ModificationRuleset {
            task_delay_ticks: 0,
            ..ModificationRuleset::default()
        };
        assert!(matches!(
            ruleset.validate(),
            Err(RulesetError::ZeroTaskDelay)
        ));
    }

    #[test]
    fn yaml_overrides_merge_with_defaults() {
        let ruleset = ModificationRuleset::from_yaml_str(
            "max_per_task: 250\nblock_blacklist:\n  - bedrock\ndrain_lava: false\n",
        )
        .unwrap();
        assert_eq!(ruleset.max_per_task, 250);
        assert!(ruleset.block_blacklist.contains(&Material::from("bedrock")));
        assert!(!ruleset.drain_lava);
        // Unspecified fields keep their defaults.
        assert!(ruleset.move_entities);
        assert_eq!(ruleset.task_delay_ticks, 1);
    }

    #[test]
    fn bad_yaml_bounds_fail_on_load() {
        assert!(ModificationRuleset::from_yaml_str("max_per_task: 0\n").is_err());
    }
}
