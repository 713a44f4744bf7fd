use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::reset::ResetPolicy;

/// Administrative levels used to infer a choice field's parent, outermost first.
pub const DEFAULT_GEO_HIERARCHY: [&str; 4] = ["province", "antenne", "zone", "aire"];

/// Tunables shared by every consuming surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    /// How far answer clearing propagates after a change.
    pub reset_policy: ResetPolicy,
    /// Level names for implicit parent inference by substring match.
    pub geo_hierarchy: Vec<String>,
    /// Declared child field → parent field table, consulted before inference.
    pub parent_fields: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reset_policy: ResetPolicy::default(),
            geo_hierarchy: DEFAULT_GEO_HIERARCHY.iter().map(|s| s.to_string()).collect(),
            parent_fields: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_value(json!({ "reset_policy": "transitive" })).expect("config");
        assert_eq!(config.reset_policy, ResetPolicy::Transitive);
        assert_eq!(config.geo_hierarchy, DEFAULT_GEO_HIERARCHY);
        assert!(config.parent_fields.is_empty());
    }
}
