//! The only code that assigns into [`State`].

use std::collections::BTreeMap;

use foundation::IdGenerator;
use layers::{LayerConfig, LayerId, LayerPatch, TreeBuilder};
use tracing::{debug, warn};

use crate::config::PortalConfig;
use crate::state::{BASELAYER_KEY, SUBJECTLAYER_KEY, State};

/// Set of layer configurations a z-index shift applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerContainer {
    /// Every leaf below a partition key.
    Partition(String),
    /// Visible leaves of the subject-data partition.
    VisibleSubjectLayers,
}

impl State {
    /// Replaces a whole partition.
    pub fn set_layer_config_by_parent_key(&mut self, key: &str, folder: LayerConfig) {
        debug!("partition '{key}' replaced");
        self.layer_config.insert(key.to_string(), folder);
        self.touch();
    }

    pub fn set_portal_config(&mut self, portal_config: PortalConfig) {
        self.portal_config = portal_config;
        self.touch();
    }

    pub fn replace_layer_config(&mut self, layer_config: BTreeMap<String, LayerConfig>) {
        self.layer_config = layer_config;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.revision += 1;
    }

    /// Appends `layer` to a partition, or to the folder with id `parent_key`
    /// when no partition has that key. Returns `false` when the target
    /// already holds the id or no such folder exists.
    pub fn push_layer(&mut self, parent_key: &str, layer: LayerConfig) -> bool {
        let target = if State::is_partition_key(parent_key) || self.layer_config.contains_key(parent_key) {
            Some(
                self.layer_config
                    .entry(parent_key.to_string())
                    .or_insert_with(|| LayerConfig::container(Vec::new())),
            )
        } else {
            let is_folder = |c: &LayerConfig| {
                c.elements.is_some() && c.id.as_ref().and_then(LayerId::as_single) == Some(parent_key)
            };
            self.layer_config
                .values_mut()
                .find_map(|partition| partition.find_mut(&is_folder))
        };
        let Some(target) = target else {
            warn!("no folder '{parent_key}' to add layer {:?} to", layer.id_str());
            return false;
        };

        let elements = target.elements.get_or_insert_with(Vec::new);
        let present = match &layer.id {
            Some(id) => elements.iter().any(|e| e.has_id(id)),
            None => false,
        };
        if present {
            return false;
        }
        elements.push(layer);
        true
    }

    /// Merges `patch` into every configuration with `id`, in every partition.
    pub fn replace_by_id(&mut self, id: &LayerId, patch: &LayerPatch) -> Vec<LayerConfig> {
        self.layer_config
            .values_mut()
            .flat_map(|partition| partition.replace_by_id(id, patch))
            .collect()
    }

    fn container_leaves_mut(&mut self, container: &LayerContainer) -> Vec<&mut LayerConfig> {
        match container {
            LayerContainer::Partition(key) => self
                .layer_config
                .get_mut(key)
                .map(LayerConfig::leaves_mut)
                .unwrap_or_default(),
            LayerContainer::VisibleSubjectLayers => self
                .layer_config
                .get_mut(SUBJECTLAYER_KEY)
                .map(LayerConfig::leaves_mut)
                .unwrap_or_default()
                .into_iter()
                .filter(|c| c.is_visible())
                .collect(),
        }
    }

    /// Moves every entry of `container` numbered above `max_z_index` up by
    /// one, lowest first.
    pub fn shift_z_indexes_above(&mut self, container: &LayerContainer, max_z_index: i64) {
        let mut leaves = self.container_leaves_mut(container);
        leaves.sort_by_key(|c| c.z_index);
        let mut shifted = 0;
        for leaf in leaves {
            if let Some(z) = leaf.z_index.filter(|z| *z > max_z_index) {
                leaf.z_index = Some(z + 1);
                shifted += 1;
            }
        }
        if shifted > 0 {
            debug!("shifted {shifted} z-indexes above {max_z_index}");
        }
    }

    /// Renumbers every numbered leaf to `1..=k`, baselayers first. Relative
    /// order is kept and ties keep document order. Returns `k`.
    pub fn renumber_z_indexes(&mut self) -> i64 {
        let mut next = 1;
        for key in [BASELAYER_KEY, SUBJECTLAYER_KEY] {
            let Some(partition) = self.layer_config.get_mut(key) else {
                continue;
            };
            let mut numbered: Vec<&mut LayerConfig> = partition
                .leaves_mut()
                .into_iter()
                .filter(|c| c.z_index.is_some())
                .collect();
            numbered.sort_by_key(|c| c.z_index);
            for leaf in numbered {
                leaf.z_index = Some(next);
                next += 1;
            }
        }
        debug!("z-indexes compacted to 1..={}", next - 1);
        next - 1
    }

    /// Flags every layer of the baselayer partition with `baselayer: true`.
    pub fn stamp_baselayer(&mut self) {
        if let Some(partition) = self.layer_config.get_mut(BASELAYER_KEY) {
            for leaf in partition.leaves_mut() {
                leaf.baselayer = Some(true);
            }
        }
    }

    /// Gives every authored folder a fresh id and links children to it.
    pub fn assign_folder_ids(&mut self, ids: &mut IdGenerator) {
        let mut builder = TreeBuilder::new(ids);
        for partition in self.layer_config.values_mut() {
            builder.set_ids_at_folders(partition.outermost_folders_mut());
        }
    }

    /// Marks `key` as the only active category.
    pub fn activate_category(&mut self, key: &str) {
        for category in self.portal_config.tree.categories.iter_mut() {
            category.active = Some(category.key == key);
        }
        self.touch();
    }
}
