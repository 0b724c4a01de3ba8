//! Persisted portal configuration document.

use std::collections::BTreeMap;

use layers::LayerConfig;
use layers::merge::DEFAULT_VALID_LAYER_TYPES_AUTO_TREE;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Tree type that derives the subject-data folders from catalog metadata.
pub const TREE_TYPE_AUTO: &str = "auto";

/// `{ portalConfig, layerConfig }` as stored by the portal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    #[serde(default)]
    pub portal_config: PortalConfig,
    /// Partition key to partition container.
    #[serde(default)]
    pub layer_config: BTreeMap<String, LayerConfig>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConfigDocument {
    pub fn from_json_str(raw: &str) -> Result<Self, StoreError> {
        serde_json::from_str(raw).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn from_json_value(value: Value) -> Result<Self, StoreError> {
        serde_json::from_value(value).map_err(|e| StoreError::Config(e.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalConfig {
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeConfig {
    /// `"auto"`, `"light"` or absent.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub tree_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_layer_button: Option<AddLayerButton>,
    #[serde(default)]
    pub single_baselayer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_layer_types_auto_tree: Option<Vec<String>>,
    #[serde(
        rename = "layerIDsToIgnore",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub layer_ids_to_ignore: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TreeConfig {
    pub fn is_auto(&self) -> bool {
        self.tree_type.as_deref() == Some(TREE_TYPE_AUTO)
    }

    /// An explicit `addLayerButton.active` wins; otherwise only auto trees
    /// show the button.
    pub fn show_layer_add_button(&self) -> bool {
        match &self.add_layer_button {
            Some(AddLayerButton { active: Some(active) }) => *active,
            _ => self.is_auto(),
        }
    }

    pub fn valid_layer_types(&self) -> Vec<String> {
        match &self.valid_layer_types_auto_tree {
            Some(types) => types.clone(),
            None => DEFAULT_VALID_LAYER_TYPES_AUTO_TREE
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }

    /// The category flagged active, else the first configured one.
    pub fn active_or_first_category(&self) -> Option<&Category> {
        self.categories
            .iter()
            .find(|c| c.active == Some(true))
            .or_else(|| self.categories.first())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddLayerButton {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

/// Grouping dimension offered to the user, keyed by a dataset attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Category {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            ..Self::default()
        }
    }
}
