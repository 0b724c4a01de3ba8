use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// One record of the service catalog, before it is merged with persisted
/// portal configuration.
///
/// Only `id` is typed; everything else (`typ`, `url`, `datasets`, ...) stays in
/// `attributes` because catalogs differ wildly between deployments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLayer {
    pub id: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl RawLayer {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Service type such as `"WMS"` or `"TILESET3D"`.
    pub fn typ(&self) -> Option<&str> {
        self.attributes.get("typ").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.attributes.get("name").and_then(Value::as_str)
    }

    /// First entry of `datasets` if it is an object.
    pub fn first_dataset(&self) -> Option<&Map<String, Value>> {
        self.attributes
            .get("datasets")
            .and_then(Value::as_array)
            .and_then(|d| d.first())
            .and_then(Value::as_object)
    }

    /// Whether every `(key, value)` pair of `query` is present on this record.
    /// The key `id` is matched against the typed id.
    pub fn matches(&self, query: &Map<String, Value>) -> bool {
        query.iter().all(|(key, expected)| {
            if key == "id" {
                expected.as_str() == Some(self.id.as_str())
            } else {
                self.attributes.get(key) == Some(expected)
            }
        })
    }

    fn from_value(value: Value) -> Result<Self, CatalogError> {
        let Value::Object(mut attributes) = value else {
            return Err(CatalogError::Corrupt("catalog entry is not an object".to_string()));
        };
        let id = match attributes.remove("id") {
            Some(Value::String(id)) => id,
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(CatalogError::Corrupt("catalog entry without id".to_string())),
        };
        Ok(Self { id, attributes })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    Corrupt(String),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Corrupt(msg) => write!(f, "catalog corrupt: {msg}"),
        }
    }
}

impl std::error::Error for CatalogError {}

/// Read access to the raw layer list.
pub trait RawLayerSource {
    /// All records in catalog order.
    fn layer_list(&self) -> &[RawLayer];

    /// First record matching every pair of `query`.
    fn layer_where(&self, query: &Map<String, Value>) -> Option<&RawLayer> {
        self.layer_list().iter().find(|layer| layer.matches(query))
    }

    fn layer_by_id(&self, id: &str) -> Option<&RawLayer> {
        self.layer_list().iter().find(|layer| layer.id == id)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct InMemoryRawLayerList {
    layers: Vec<RawLayer>,
}

impl InMemoryRawLayerList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_layers(layers: Vec<RawLayer>) -> Self {
        Self { layers }
    }

    /// Parses a catalog document: a JSON array of layer records.
    ///
    /// Records that are not objects or carry no usable id are skipped with a
    /// warning; a document that is not an array is an error.
    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| CatalogError::Corrupt(e.to_string()))?;
        Self::from_json_value(value)
    }

    pub fn from_json_value(value: Value) -> Result<Self, CatalogError> {
        let Value::Array(entries) = value else {
            return Err(CatalogError::Corrupt(
                "catalog document must be an array".to_string(),
            ));
        };
        let mut layers = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            match RawLayer::from_value(entry) {
                Ok(layer) => layers.push(layer),
                Err(err) => warn!("skipping catalog entry {index}: {err}"),
            }
        }
        Ok(Self { layers })
    }

    /// Adds or replaces the record with the same id, keeping catalog order.
    pub fn upsert(&mut self, layer: RawLayer) {
        match self.layers.iter_mut().find(|l| l.id == layer.id) {
            Some(existing) => *existing = layer,
            None => self.layers.push(layer),
        }
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.layers.len();
        self.layers.retain(|l| l.id != id);
        self.layers.len() != before
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl RawLayerSource for InMemoryRawLayerList {
    fn layer_list(&self) -> &[RawLayer] {
        &self.layers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parses_catalog_and_skips_broken_entries() {
        let list = InMemoryRawLayerList::from_json_str(
            r#"[
                {"id": "1", "typ": "WMS", "name": "Roads"},
                {"name": "no id"},
                42,
                {"id": 7, "typ": "WFS"}
            ]"#,
        )
        .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.layer_list()[0].typ(), Some("WMS"));
        assert_eq!(list.layer_list()[1].id, "7");
    }

    #[test]
    fn non_array_document_is_corrupt() {
        let err = InMemoryRawLayerList::from_json_str(r#"{"id": "1"}"#).unwrap_err();
        assert!(matches!(err, CatalogError::Corrupt(_)));
    }

    #[test]
    fn layer_where_matches_all_pairs() {
        let list = InMemoryRawLayerList::from_layers(vec![
            RawLayer::new("1").with_attribute("typ", json!("WMS")),
            RawLayer::new("2").with_attribute("typ", json!("WFS")),
        ]);
        let mut query = Map::new();
        query.insert("typ".to_string(), json!("WFS"));
        assert_eq!(list.layer_where(&query).map(|l| l.id.as_str()), Some("2"));

        query.insert("id".to_string(), json!("1"));
        assert!(list.layer_where(&query).is_none());

        let mut by_id = Map::new();
        by_id.insert("id".to_string(), json!("1"));
        assert_eq!(list.layer_where(&by_id).map(|l| l.id.as_str()), Some("1"));
    }

    #[test]
    fn first_dataset_requires_an_object_entry() {
        let good = RawLayer::new("1").with_attribute("datasets", json!([{"md_name": "M"}]));
        assert_eq!(good.first_dataset().and_then(|d| d.get("md_name")), Some(&json!("M")));
        let empty = RawLayer::new("2").with_attribute("datasets", json!([]));
        assert!(empty.first_dataset().is_none());
        let malformed = RawLayer::new("3").with_attribute("datasets", json!("oops"));
        assert!(malformed.first_dataset().is_none());
    }

    #[test]
    fn upsert_keeps_order_and_delete_reports_change() {
        let mut list = InMemoryRawLayerList::new();
        list.upsert(RawLayer::new("a"));
        list.upsert(RawLayer::new("b"));
        list.upsert(RawLayer::new("a").with_attribute("name", json!("A")));
        let ids: Vec<&str> = list.layer_list().iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(list.layer_by_id("a").and_then(RawLayer::name), Some("A"));
        assert!(list.delete("a"));
        assert!(!list.delete("a"));
    }

    #[test]
    fn serializes_flat() {
        let layer = RawLayer::new("1").with_attribute("typ", json!("WMS"));
        assert_eq!(serde_json::to_value(&layer).unwrap(), json!({"id": "1", "typ": "WMS"}));
    }
}
