//! Derived views over [`State`]. Everything here is recomputed on access.

use std::collections::BTreeMap;

use foundation::{DEFAULT_MAX_DEPTH, SortOrder, get_nested_values, sort_objects};
use layers::{LayerConfig, LayerId};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::Category;
use crate::error::StoreError;
use crate::state::{BASELAYER_KEY, SUBJECTLAYER_KEY, State};

/// Per-layer state written to the URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerUrlParam {
    pub id: LayerId,
    pub visibility: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transparency: Option<u32>,
}

/// A catalog id that occurs more than once inside one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateId {
    pub partition: String,
    pub id: String,
    pub occurrences: usize,
}

impl State {
    /// Every leaf of every partition, partitions in key order.
    pub fn all_layer_configs(&self) -> Vec<&LayerConfig> {
        self.layer_config.values().flat_map(LayerConfig::leaves).collect()
    }

    pub fn all_layer_configs_by_parent_key(&self, key: &str) -> Vec<&LayerConfig> {
        self.layer_config
            .get(key)
            .map(LayerConfig::leaves)
            .unwrap_or_default()
    }

    /// Direct children of a partition, folders included.
    pub fn layer_configs_by_parent_key(&self, key: &str) -> &[LayerConfig] {
        self.layer_config
            .get(key)
            .and_then(|p| p.elements.as_deref())
            .unwrap_or(&[])
    }

    /// Folders of the subject-data partition in pre-order.
    pub fn all_folders(&self) -> Vec<&LayerConfig> {
        match self.layer_config.get(SUBJECTLAYER_KEY) {
            Some(partition) => partition.search(&|c: &LayerConfig| c.is_folder()),
            None => Vec::new(),
        }
    }

    pub fn folder_by_id(&self, id: &str) -> Option<&LayerConfig> {
        self.all_folders()
            .into_iter()
            .find(|f| f.id.as_ref().and_then(LayerId::as_single) == Some(id))
    }

    pub fn layer_config_by_id(&self, id: &LayerId) -> Option<&LayerConfig> {
        self.all_layer_configs().into_iter().find(|c| c.has_id(id))
    }

    /// First layer sharing any catalog id with `id`. An array id counts as
    /// one identity per contained string.
    pub fn layer_config_sharing_id(&self, id: &LayerId) -> Option<&LayerConfig> {
        self.all_layer_configs()
            .into_iter()
            .find(|c| c.id.as_ref().is_some_and(|own| own.overlaps(id)))
    }

    /// Layers whose fields equal every pair of `attributes`.
    ///
    /// Only primitive filter values are supported; an object or array value
    /// is rejected before anything is scanned.
    pub fn layer_configs_by_attributes(
        &self,
        attributes: &Map<String, Value>,
    ) -> Result<Vec<&LayerConfig>, StoreError> {
        if let Some((key, _)) = attributes
            .iter()
            .find(|(_, v)| v.is_object() || v.is_array())
        {
            return Err(StoreError::UnsupportedFilter { key: key.clone() });
        }
        Ok(self
            .all_layer_configs()
            .into_iter()
            .filter(|c| {
                attributes
                    .iter()
                    .all(|(key, value)| c.field_value(key).as_ref() == Some(value))
            })
            .collect())
    }

    /// Highest `zIndex` in the partition, `-1` when nothing is numbered.
    pub fn max_z_index_of_layer_configs_by_parent_key(&self, key: &str) -> i64 {
        self.max_z_index(key).unwrap_or(-1)
    }

    fn max_z_index(&self, key: &str) -> Option<i64> {
        self.all_layer_configs_by_parent_key(key)
            .iter()
            .filter_map(|c| c.z_index)
            .max()
    }

    /// `zIndex` a new entry of partition `key` should get. Falls back to the
    /// other partition when `key` has no numbered entries.
    pub fn next_z_index_for(&self, key: &str) -> i64 {
        let max = self
            .max_z_index(key)
            .or_else(|| self.max_z_index(State::other_partition(key)))
            .unwrap_or(-1);
        max + 1
    }

    /// Existing `zIndex` of `id`, or the next free one of its partition.
    /// `None` when `id` is not configured.
    pub fn determine_z_index(&self, id: &LayerId) -> Option<i64> {
        let config = self.layer_config_by_id(id)?;
        if let Some(z) = config.z_index {
            return Some(z);
        }
        let key = if self.is_baselayer(id) {
            BASELAYER_KEY
        } else {
            SUBJECTLAYER_KEY
        };
        Some(self.next_z_index_for(key))
    }

    pub fn is_baselayer(&self, id: &LayerId) -> bool {
        self.all_layer_configs_by_parent_key(BASELAYER_KEY)
            .iter()
            .any(|c| c.has_id(id))
    }

    pub fn visible_layer_configs(&self) -> Vec<&LayerConfig> {
        self.all_layer_configs()
            .into_iter()
            .filter(|c| c.is_visible())
            .collect()
    }

    pub fn invisible_layer_configs(&self) -> Vec<&LayerConfig> {
        self.all_layer_configs()
            .into_iter()
            .filter(|c| !c.is_visible())
            .collect()
    }

    pub fn visible_baselayer_configs(&self) -> Vec<&LayerConfig> {
        self.all_layer_configs_by_parent_key(BASELAYER_KEY)
            .into_iter()
            .filter(|c| c.is_visible())
            .collect()
    }

    pub fn invisible_baselayer_configs(&self) -> Vec<&LayerConfig> {
        self.all_layer_configs_by_parent_key(BASELAYER_KEY)
            .into_iter()
            .filter(|c| !c.is_visible())
            .collect()
    }

    pub fn visible_subject_data_layer_configs(&self) -> Vec<&LayerConfig> {
        self.all_layer_configs_by_parent_key(SUBJECTLAYER_KEY)
            .into_iter()
            .filter(|c| c.is_visible())
            .collect()
    }

    /// Nodes of any partition whose `parentId` is `folder_id`.
    pub fn layer_configs_by_parent_id(&self, folder_id: &str) -> Vec<&LayerConfig> {
        let is_child = |c: &LayerConfig| c.parent_id.as_deref() == Some(folder_id);
        self.layer_config
            .values()
            .flat_map(|p| p.search(&is_child))
            .collect()
    }

    /// Layers shown in the tree, ordered by `zIndex`.
    pub fn layer_url_params(&self) -> Vec<LayerUrlParam> {
        let mut records: Vec<Value> = self
            .all_layer_configs()
            .into_iter()
            .filter(|c| c.show_in_layer_tree == Some(true))
            .filter_map(|c| serde_json::to_value(c).ok())
            .collect();
        sort_objects(&mut records, "zIndex", SortOrder::Asc);

        records
            .into_iter()
            .filter_map(|record| {
                let id = serde_json::from_value(record.get("id")?.clone()).ok()?;
                Some(LayerUrlParam {
                    id,
                    visibility: record
                        .get("visibility")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                    transparency: record
                        .get("transparency")
                        .and_then(Value::as_u64)
                        .and_then(|t| u32::try_from(t).ok()),
                })
            })
            .collect()
    }

    pub fn show_layer_add_button(&self) -> bool {
        self.portal_config.tree.show_layer_add_button()
    }

    pub fn active_or_first_category(&self) -> Option<&Category> {
        self.portal_config.tree.active_or_first_category()
    }

    pub fn all_categories(&self) -> &[Category] {
        &self.portal_config.tree.categories
    }

    /// Catalog ids configured more than once within the same partition.
    pub fn duplicate_layer_ids(&self) -> Vec<DuplicateId> {
        let mut duplicates = Vec::new();
        for (key, partition) in &self.layer_config {
            let Ok(tree) = serde_json::to_value(partition) else {
                continue;
            };
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for leaf in get_nested_values(&tree, "elements", true, DEFAULT_MAX_DEPTH) {
                let ids: Vec<&str> = match leaf.get("id") {
                    Some(Value::String(id)) => vec![id.as_str()],
                    Some(Value::Array(ids)) => ids.iter().filter_map(Value::as_str).collect(),
                    _ => Vec::new(),
                };
                for id in ids {
                    *counts.entry(id.to_string()).or_default() += 1;
                }
            }
            duplicates.extend(
                counts
                    .into_iter()
                    .filter(|(_, n)| *n > 1)
                    .map(|(id, occurrences)| DuplicateId {
                        partition: key.clone(),
                        id,
                        occurrences,
                    }),
            );
        }
        duplicates
    }
}
