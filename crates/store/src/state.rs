use std::collections::BTreeMap;

use layers::LayerConfig;

use crate::config::PortalConfig;

/// Partition holding background maps.
pub const BASELAYER_KEY: &str = "baselayer";
/// Partition holding subject data.
pub const SUBJECTLAYER_KEY: &str = "subjectlayer";

/// Store state. Only the methods in `mutations` assign into it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    pub portal_config: PortalConfig,
    /// Partition key (or custom folder id) to partition container.
    pub layer_config: BTreeMap<String, LayerConfig>,
    /// Bumped whenever observers should re-read `layer_config`.
    pub revision: u64,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_partition_key(key: &str) -> bool {
        key == BASELAYER_KEY || key == SUBJECTLAYER_KEY
    }

    /// The other fixed partition. Custom keys count as subject data.
    pub fn other_partition(key: &str) -> &'static str {
        if key == BASELAYER_KEY {
            SUBJECTLAYER_KEY
        } else {
            BASELAYER_KEY
        }
    }
}
