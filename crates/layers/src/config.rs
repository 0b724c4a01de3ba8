//! Layer configuration tree.
//!
//! A [`LayerConfig`] is either a layer leaf or a folder/group holding ordered
//! `elements`. Walks over the tree treat every node that has `elements` as an
//! inner node and every other node as a leaf, regardless of its `type`.

use std::collections::BTreeSet;
use std::fmt;

use catalog::RawLayer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Layer identity. Grouped layers share one logical id across several
/// catalog records and are written as an array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerId {
    Single(String),
    Multi(Vec<String>),
}

impl LayerId {
    /// Normalised identity: the set of contained catalog ids.
    pub fn identity(&self) -> BTreeSet<&str> {
        self.parts().collect()
    }

    pub fn parts(&self) -> impl Iterator<Item = &str> {
        let parts: &[String] = match self {
            LayerId::Single(id) => std::slice::from_ref(id),
            LayerId::Multi(ids) => ids,
        };
        parts.iter().map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.parts().any(|p| p == id)
    }

    /// True when both ids name at least one common catalog id.
    pub fn overlaps(&self, other: &LayerId) -> bool {
        other.parts().any(|p| self.contains(p))
    }

    pub fn as_single(&self) -> Option<&str> {
        match self {
            LayerId::Single(id) => Some(id),
            LayerId::Multi(_) => None,
        }
    }
}

impl PartialEq for LayerId {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for LayerId {}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerId::Single(id) => write!(f, "{id}"),
            LayerId::Multi(ids) => write!(f, "{}", ids.join(",")),
        }
    }
}

impl From<&str> for LayerId {
    fn from(id: &str) -> Self {
        LayerId::Single(id.to_string())
    }
}

impl From<String> for LayerId {
    fn from(id: String) -> Self {
        LayerId::Single(id)
    }
}

impl From<Vec<String>> for LayerId {
    fn from(ids: Vec<String>) -> Self {
        LayerId::Multi(ids)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    #[default]
    Layer,
    Folder,
    Group,
}

impl LayerType {
    pub fn is_layer(&self) -> bool {
        *self == LayerType::Layer
    }
}

/// Document keys that map onto typed [`LayerConfig`] fields besides `id`.
const TYPED_FIELDS: &[&str] = &[
    "type",
    "name",
    "zIndex",
    "visibility",
    "showInLayerTree",
    "transparency",
    "baselayer",
    "parentId",
    "elements",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<LayerId>,
    /// Absent in documents means a plain layer.
    #[serde(rename = "type", default, skip_serializing_if = "LayerType::is_layer")]
    pub kind: LayerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_in_layer_tree: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparency: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baselayer: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<Vec<LayerConfig>>,
    /// Catalog and deployment specific fields (`typ`, `url`, `datasets`, ...).
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl LayerConfig {
    pub fn layer(id: impl Into<LayerId>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            kind: LayerType::Folder,
            name: Some(name.into()),
            elements: Some(Vec::new()),
            ..Self::default()
        }
    }

    /// Container with children and nothing else, as used for partitions.
    pub fn container(elements: Vec<LayerConfig>) -> Self {
        Self {
            elements: Some(elements),
            ..Self::default()
        }
    }

    /// Converts a catalog record. Typed fields whose value does not fit the
    /// model are kept as plain attributes; the rest stay typed.
    pub fn from_raw(raw: &RawLayer) -> Self {
        let mut map = raw.attributes.clone();
        map.insert("id".to_string(), Value::String(raw.id.clone()));

        let mut misfits = Map::new();
        for key in TYPED_FIELDS {
            let Some(value) = map.get(*key) else {
                continue;
            };
            let mut single = Map::new();
            single.insert(key.to_string(), value.clone());
            if let Err(err) = serde_json::from_value::<LayerConfig>(Value::Object(single)) {
                warn!("catalog layer {}: field '{key}' does not fit the layer model: {err}", raw.id);
                if let Some(value) = map.remove(*key) {
                    misfits.insert(key.to_string(), value);
                }
            }
        }

        match serde_json::from_value::<LayerConfig>(Value::Object(map)) {
            Ok(mut config) => {
                config.attributes.extend(misfits);
                config
            }
            Err(err) => {
                warn!("catalog layer {} does not fit the layer model: {err}", raw.id);
                Self {
                    id: Some(LayerId::Single(raw.id.clone())),
                    attributes: raw.attributes.clone(),
                    ..Self::default()
                }
            }
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == LayerType::Folder
    }

    pub fn has_id(&self, id: &LayerId) -> bool {
        self.id.as_ref() == Some(id)
    }

    pub fn id_str(&self) -> Option<String> {
        self.id.as_ref().map(LayerId::to_string)
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Catalog service type (`typ`).
    pub fn typ(&self) -> Option<&str> {
        self.attributes.get("typ").and_then(Value::as_str)
    }

    pub fn is_visible(&self) -> bool {
        self.visibility == Some(true)
    }

    /// JSON view of a single field, typed or not.
    pub fn field_value(&self, key: &str) -> Option<Value> {
        match key {
            "id" => self.id.as_ref().and_then(|id| serde_json::to_value(id).ok()),
            "type" => serde_json::to_value(self.kind).ok(),
            "name" => self.name.clone().map(Value::String),
            "zIndex" => self.z_index.map(Value::from),
            "visibility" => self.visibility.map(Value::Bool),
            "showInLayerTree" => self.show_in_layer_tree.map(Value::Bool),
            "transparency" => self.transparency.map(Value::from),
            "baselayer" => self.baselayer.map(Value::Bool),
            "parentId" => self.parent_id.clone().map(Value::String),
            "elements" => self
                .elements
                .as_ref()
                .and_then(|e| serde_json::to_value(e).ok()),
            other => self.attributes.get(other).cloned(),
        }
    }

    /// `Object.assign`-style merge: every field set on `patch` overwrites.
    pub fn apply(&mut self, patch: &LayerPatch) {
        if let Some(id) = &patch.id {
            self.id = Some(id.clone());
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(name) = &patch.name {
            self.name = Some(name.clone());
        }
        if let Some(z) = patch.z_index {
            self.z_index = Some(z);
        }
        if let Some(v) = patch.visibility {
            self.visibility = Some(v);
        }
        if let Some(v) = patch.show_in_layer_tree {
            self.show_in_layer_tree = Some(v);
        }
        if let Some(t) = patch.transparency {
            self.transparency = Some(t);
        }
        if let Some(b) = patch.baselayer {
            self.baselayer = Some(b);
        }
        if let Some(p) = &patch.parent_id {
            self.parent_id = Some(p.clone());
        }
        if let Some(elements) = &patch.elements {
            self.elements = Some(elements.clone());
        }
        for (key, value) in &patch.attributes {
            self.attributes.insert(key.clone(), value.clone());
        }
    }

    /// Leaves below this node in document order. Nodes with `elements` are
    /// descended into and never returned themselves.
    pub fn leaves(&self) -> Vec<&LayerConfig> {
        let mut out = Vec::new();
        collect_leaves(self, &mut out);
        out
    }

    pub fn leaves_mut(&mut self) -> Vec<&mut LayerConfig> {
        let mut out = Vec::new();
        collect_leaves_mut(self, &mut out);
        out
    }

    /// Pre-order search including `self`, descending only through `elements`.
    pub fn search(&self, predicate: &impl Fn(&LayerConfig) -> bool) -> Vec<&LayerConfig> {
        let mut out = Vec::new();
        search_nodes(self, predicate, &mut out);
        out
    }

    pub fn find_mut(
        &mut self,
        predicate: &impl Fn(&LayerConfig) -> bool,
    ) -> Option<&mut LayerConfig> {
        if predicate(self) {
            return Some(self);
        }
        self.elements
            .as_mut()?
            .iter_mut()
            .find_map(|child| child.find_mut(predicate))
    }

    /// Folders below this node that are not themselves inside a folder.
    pub fn outermost_folders_mut(&mut self) -> Vec<&mut LayerConfig> {
        let mut out = Vec::new();
        if let Some(children) = self.elements.as_mut() {
            for child in children.iter_mut() {
                collect_outermost_folders(child, &mut out);
            }
        }
        out
    }

    /// Merges `patch` into every descendant whose id equals `id`.
    ///
    /// Non-matching children are only searched when they have `elements`.
    /// Returns a copy of every merged node.
    pub fn replace_by_id(&mut self, id: &LayerId, patch: &LayerPatch) -> Vec<LayerConfig> {
        let mut merged = Vec::new();
        replace_nodes(self, id, patch, &mut merged);
        merged
    }
}

fn collect_leaves<'a>(node: &'a LayerConfig, out: &mut Vec<&'a LayerConfig>) {
    let Some(children) = &node.elements else {
        return;
    };
    for child in children {
        if child.elements.is_some() {
            collect_leaves(child, out);
        } else {
            out.push(child);
        }
    }
}

fn collect_leaves_mut<'a>(node: &'a mut LayerConfig, out: &mut Vec<&'a mut LayerConfig>) {
    let Some(children) = node.elements.as_mut() else {
        return;
    };
    for child in children.iter_mut() {
        if child.elements.is_some() {
            collect_leaves_mut(child, out);
        } else {
            out.push(child);
        }
    }
}

fn search_nodes<'a>(
    node: &'a LayerConfig,
    predicate: &impl Fn(&LayerConfig) -> bool,
    out: &mut Vec<&'a LayerConfig>,
) {
    if predicate(node) {
        out.push(node);
    }
    if let Some(children) = &node.elements {
        for child in children {
            search_nodes(child, predicate, out);
        }
    }
}

fn collect_outermost_folders<'a>(node: &'a mut LayerConfig, out: &mut Vec<&'a mut LayerConfig>) {
    if node.is_folder() {
        out.push(node);
        return;
    }
    if let Some(children) = node.elements.as_mut() {
        for child in children.iter_mut() {
            collect_outermost_folders(child, out);
        }
    }
}

fn replace_nodes(
    node: &mut LayerConfig,
    id: &LayerId,
    patch: &LayerPatch,
    merged: &mut Vec<LayerConfig>,
) {
    let Some(children) = node.elements.as_mut() else {
        return;
    };
    for child in children.iter_mut() {
        if child.has_id(id) {
            child.apply(patch);
            merged.push(child.clone());
        } else if child.elements.is_some() {
            replace_nodes(child, id, patch, merged);
        }
    }
}

/// Partial layer configuration; unset fields leave the target untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<LayerId>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<LayerType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_in_layer_tree: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparency: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baselayer: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<Vec<LayerConfig>>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl LayerPatch {
    pub fn visibility(visible: bool) -> Self {
        Self {
            visibility: Some(visible),
            ..Self::default()
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

impl From<LayerConfig> for LayerPatch {
    fn from(config: LayerConfig) -> Self {
        Self {
            id: config.id,
            kind: Some(config.kind),
            name: config.name,
            z_index: config.z_index,
            visibility: config.visibility,
            show_in_layer_tree: config.show_in_layer_tree,
            transparency: config.transparency,
            baselayer: config.baselayer,
            parent_id: config.parent_id,
            elements: config.elements,
            attributes: config.attributes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn tree() -> LayerConfig {
        serde_json::from_value(json!({
            "elements": [
                {"id": "1", "name": "one", "typ": "WMS"},
                {
                    "type": "folder",
                    "name": "f",
                    "elements": [
                        {"id": "2"},
                        {"type": "folder", "name": "g", "elements": [{"id": ["3", "4"]}]}
                    ]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn missing_type_means_layer_and_is_not_written_back() {
        let config: LayerConfig = serde_json::from_value(json!({"id": "a"})).unwrap();
        assert_eq!(config.kind, LayerType::Layer);
        assert_eq!(serde_json::to_value(&config).unwrap(), json!({"id": "a"}));
    }

    #[test]
    fn array_ids_compare_by_identity() {
        let a = LayerId::Multi(vec!["x".into(), "y".into()]);
        let b = LayerId::Multi(vec!["y".into(), "x".into()]);
        assert_eq!(a, b);
        assert_ne!(a, LayerId::from("x"));
        assert_eq!(LayerId::Multi(vec!["x".into()]), LayerId::from("x"));
        assert!(a.contains("y"));
        assert_eq!(a.to_string(), "x,y");
    }

    #[test]
    fn leaves_follow_document_order() {
        let t = tree();
        let ids: Vec<String> = t.leaves().iter().filter_map(|l| l.id_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3,4"]);
    }

    #[test]
    fn search_finds_nested_folders() {
        let t = tree();
        let names: Vec<&str> = t
            .search(&|c: &LayerConfig| c.is_folder())
            .iter()
            .filter_map(|c| c.name.as_deref())
            .collect();
        assert_eq!(names, vec!["f", "g"]);
    }

    #[test]
    fn replace_merges_and_keeps_other_fields() {
        let mut t = tree();
        let merged = t.replace_by_id(&LayerId::from("1"), &LayerPatch::visibility(true));
        assert_eq!(merged.len(), 1);
        let leaf = t.leaves()[0];
        assert_eq!(leaf.visibility, Some(true));
        assert_eq!(leaf.name.as_deref(), Some("one"));
        assert_eq!(leaf.typ(), Some("WMS"));
    }

    #[test]
    fn replace_reaches_array_ids_in_subfolders() {
        let mut t = tree();
        let id = LayerId::Multi(vec!["4".into(), "3".into()]);
        let merged = t.replace_by_id(&id, &LayerPatch::visibility(false));
        assert_eq!(merged.len(), 1);
        assert_eq!(t.leaves()[2].visibility, Some(false));
    }

    #[test]
    fn outermost_folders_skip_nested_ones() {
        let mut t = tree();
        let folders = t.outermost_folders_mut();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].name.as_deref(), Some("f"));
    }

    #[test]
    fn raw_records_keep_unknown_fields() {
        let raw = RawLayer::new("9")
            .with_attribute("name", json!("Nine"))
            .with_attribute("url", json!("https://example.org/wms"))
            .with_attribute("transparency", json!("half"));
        let config = LayerConfig::from_raw(&raw);
        assert_eq!(config.id, Some(LayerId::from("9")));
        assert_eq!(config.attribute("url"), Some(&json!("https://example.org/wms")));
        // Unparseable typed field falls back to a plain attribute.
        assert_eq!(config.transparency, None);
        assert_eq!(config.attribute("transparency"), Some(&json!("half")));
    }

    #[test]
    fn raw_record_with_bad_field_keeps_other_typed_fields() {
        let raw = RawLayer::new("9")
            .with_attribute("name", json!("Nine"))
            .with_attribute("visibility", json!(true))
            .with_attribute("zIndex", json!("top"));
        let config = LayerConfig::from_raw(&raw);
        assert_eq!(config.name.as_deref(), Some("Nine"));
        assert_eq!(config.visibility, Some(true));
        assert_eq!(config.z_index, None);
        assert_eq!(config.attribute("zIndex"), Some(&json!("top")));
        assert_eq!(config.attribute("name"), None);
    }

    #[test]
    fn array_ids_overlap_on_any_shared_part() {
        let pair = LayerId::Multi(vec!["1".into(), "2".into()]);
        assert!(pair.overlaps(&LayerId::from("1")));
        assert!(LayerId::from("2").overlaps(&pair));
        assert!(!pair.overlaps(&LayerId::from("3")));
        assert_ne!(pair, LayerId::from("1"));
    }

    #[test]
    fn field_value_covers_typed_and_free_fields() {
        let mut config = LayerConfig::layer("a");
        config.z_index = Some(3);
        config.attributes.insert("typ".into(), json!("WMS"));
        assert_eq!(config.field_value("id"), Some(json!("a")));
        assert_eq!(config.field_value("zIndex"), Some(json!(3)));
        assert_eq!(config.field_value("typ"), Some(json!("WMS")));
        assert_eq!(config.field_value("visibility"), None);
    }
}
