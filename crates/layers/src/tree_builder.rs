//! Automatic folder tree built from catalog metadata.
//!
//! Layers are grouped by the value of a category key on their first dataset,
//! then by metadata name (`md_name`). A metadata name that occurs once in a
//! group becomes a plain layer entry; two or more share a sub-folder named
//! after it.
//!
//! The build runs in two passes: the first classifies every catalog record
//! into its group and metadata bucket, the second emits folders or leaves per
//! bucket and assigns ids. Nothing is restructured after it was emitted.

use std::collections::BTreeSet;

use catalog::{RawLayer, RawLayerSource};
use foundation::IdGenerator;
use serde_json::Value;
use tracing::debug;

use crate::config::{LayerConfig, LayerId, LayerPatch, LayerType};

/// Catalog service types rendered by the 3D engine.
pub const LAYER_TYPES_3D: [&str; 3] = ["TERRAIN3D", "TILESET3D", "OBLIQUE"];

pub const FOLDER_ID_PREFIX: &str = "folder-";

pub fn is_3d_layer_type(typ: &str) -> bool {
    LAYER_TYPES_3D.contains(&typ)
}

/// Inputs of one tree build.
#[derive(Clone, Copy)]
pub struct BuildRequest<'a> {
    /// Catalog records to classify, in catalog order.
    pub raw_layers: &'a [RawLayer],
    /// Persisted baselayer partition; its layers are never regrouped.
    pub baselayer: Option<&'a LayerConfig>,
    /// Persisted subject-data partition.
    pub subjectlayer: Option<&'a LayerConfig>,
    /// Dataset key to group by. `None` disables grouping.
    pub category_key: Option<&'a str>,
    /// Persisted configurations merged over matching catalog records.
    pub first_level_overrides: &'a [LayerConfig],
    /// Used to resolve the service type of persisted layers.
    pub catalog: &'a dyn RawLayerSource,
}

/// Metadata bucket inside a group. `md_name == None` never shares a bucket.
/// Buckets are counted per group, so a metadata name shared only across
/// categories never yields a subfolder.
struct MetadataBucket {
    md_name: Option<String>,
    layers: Vec<LayerConfig>,
}

struct Group {
    name: String,
    folder_id: String,
    buckets: Vec<MetadataBucket>,
}

impl Group {
    fn bucket_for(&mut self, md_name: Option<String>) -> &mut MetadataBucket {
        let position = md_name.as_ref().and_then(|name| {
            self.buckets
                .iter()
                .position(|b| b.md_name.as_deref() == Some(name.as_str()))
        });
        match position {
            Some(i) => &mut self.buckets[i],
            None => {
                self.buckets.push(MetadataBucket {
                    md_name,
                    layers: Vec::new(),
                });
                let last = self.buckets.len() - 1;
                &mut self.buckets[last]
            }
        }
    }
}

pub struct TreeBuilder<'a> {
    ids: &'a mut IdGenerator,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(ids: &'a mut IdGenerator) -> Self {
        Self { ids }
    }

    /// Builds the subject-data folder tree.
    ///
    /// Without a category the catalog records are returned unchanged as the
    /// elements of the result.
    pub fn build(&mut self, request: BuildRequest<'_>) -> LayerConfig {
        let Some(category_key) = request.category_key.filter(|k| !k.is_empty()) else {
            let elements = request.raw_layers.iter().map(LayerConfig::from_raw).collect();
            return LayerConfig::container(elements);
        };

        let baselayer_ids = partition_ids(request.baselayer);
        let passthrough = passthrough_3d_layers(request.subjectlayer, request.catalog);
        let passthrough_ids: BTreeSet<String> = passthrough
            .iter()
            .filter_map(|l| l.id.as_ref())
            .flat_map(|id| id.parts().map(str::to_string))
            .collect();

        let mut groups: Vec<Group> = Vec::new();
        for raw in request.raw_layers {
            if baselayer_ids.contains(&raw.id) || passthrough_ids.contains(&raw.id) {
                continue;
            }
            let Some(dataset) = raw.first_dataset() else {
                continue;
            };
            let Some(group_name) = dataset.get(category_key).and_then(group_name) else {
                continue;
            };
            let md_name = dataset
                .get("md_name")
                .and_then(Value::as_str)
                .map(str::to_string);

            let mut layer = LayerConfig::from_raw(raw);
            if let Some(conf) = request
                .first_level_overrides
                .iter()
                .find(|conf| conf.id.as_ref().and_then(LayerId::as_single) == Some(raw.id.as_str()))
            {
                layer.apply(&LayerPatch::from(conf.clone()));
            }

            let group = match groups.iter().position(|g| g.name == group_name) {
                Some(i) => &mut groups[i],
                None => {
                    let folder_id = self.ids.unique_id(FOLDER_ID_PREFIX);
                    groups.push(Group {
                        name: group_name,
                        folder_id,
                        buckets: Vec::new(),
                    });
                    let last = groups.len() - 1;
                    &mut groups[last]
                }
            };
            group.bucket_for(md_name).layers.push(layer);
        }

        debug!(
            "built {} category folders for '{category_key}' ({} excluded baselayer ids, {} 3D layers passed through)",
            groups.len(),
            baselayer_ids.len(),
            passthrough.len()
        );

        let mut elements = passthrough;
        for group in groups {
            elements.push(self.emit_group(group));
        }
        LayerConfig::container(elements)
    }

    fn emit_group(&mut self, group: Group) -> LayerConfig {
        let mut children = Vec::new();
        for bucket in group.buckets {
            let single = bucket.layers.len() == 1;
            match bucket.md_name {
                Some(md_name) if !single => {
                    let folder_id = self.ids.unique_id(FOLDER_ID_PREFIX);
                    let mut layers = bucket.layers;
                    for layer in &mut layers {
                        layer.parent_id = Some(folder_id.clone());
                    }
                    sort_by_name(&mut layers);
                    let mut folder = LayerConfig::folder(md_name);
                    folder.id = Some(folder_id.into());
                    folder.parent_id = Some(group.folder_id.clone());
                    folder.elements = Some(layers);
                    children.push(folder);
                }
                _ => {
                    for mut layer in bucket.layers {
                        layer.parent_id = Some(group.folder_id.clone());
                        children.push(layer);
                    }
                }
            }
        }
        sort_by_name(&mut children);

        let mut folder = LayerConfig::folder(group.name);
        folder.id = Some(group.folder_id.into());
        folder.elements = Some(children);
        folder
    }

    /// Gives every folder a fresh id and points each child's `parentId` at
    /// its container, recursively. Nested folders get their id before their
    /// children are visited.
    pub fn set_ids_at_folders<'f>(&mut self, folders: impl IntoIterator<Item = &'f mut LayerConfig>) {
        for folder in folders {
            self.set_ids_at_folder(folder);
        }
    }

    fn set_ids_at_folder(&mut self, folder: &mut LayerConfig) {
        let folder_id = self.ids.unique_id(FOLDER_ID_PREFIX);
        folder.id = Some(folder_id.clone().into());
        let Some(children) = folder.elements.as_mut() else {
            return;
        };
        for child in children.iter_mut() {
            child.parent_id = Some(folder_id.clone());
            if child.kind == LayerType::Folder {
                self.set_ids_at_folder(child);
            }
        }
    }
}

/// Group name from a dataset category value; arrays use their first entry.
fn group_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.first().and_then(group_name),
        _ => None,
    }
}

fn partition_ids(partition: Option<&LayerConfig>) -> BTreeSet<String> {
    partition
        .map(|p| {
            p.leaves()
                .into_iter()
                .filter_map(|l| l.id.as_ref())
                .flat_map(|id| id.parts().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Layers of the subject-data partition that bypass grouping: all of them,
/// but only when every one is a 3D layer.
fn passthrough_3d_layers(
    subjectlayer: Option<&LayerConfig>,
    catalog: &dyn RawLayerSource,
) -> Vec<LayerConfig> {
    let Some(partition) = subjectlayer else {
        return Vec::new();
    };
    let leaves = partition.leaves();
    let all_3d = leaves.iter().all(|layer| {
        let typ = layer.typ().map(str::to_string).or_else(|| {
            layer
                .id
                .as_ref()
                .and_then(|id| id.parts().next())
                .and_then(|id| catalog.layer_by_id(id))
                .and_then(|raw| raw.typ().map(str::to_string))
        });
        typ.as_deref().is_some_and(is_3d_layer_type)
    });
    if !all_3d {
        return Vec::new();
    }
    leaves.into_iter().cloned().collect()
}

fn sort_by_name(elements: &mut [LayerConfig]) {
    elements.sort_by(|a, b| {
        let a = a.name.as_deref().unwrap_or_default();
        let b = b.name.as_deref().unwrap_or_default();
        a.encode_utf16().cmp(b.encode_utf16())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::InMemoryRawLayerList;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn raw(id: &str, category: Value, md_name: &str) -> RawLayer {
        RawLayer::new(id)
            .with_attribute("name", json!(format!("Layer {id}")))
            .with_attribute("typ", json!("WMS"))
            .with_attribute(
                "datasets",
                json!([{"kategorie_opendata": category, "md_name": md_name}]),
            )
    }

    fn request<'a>(
        raw_layers: &'a [RawLayer],
        catalog: &'a InMemoryRawLayerList,
    ) -> BuildRequest<'a> {
        BuildRequest {
            raw_layers,
            baselayer: None,
            subjectlayer: None,
            category_key: Some("kategorie_opendata"),
            first_level_overrides: &[],
            catalog,
        }
    }

    fn ids_of(elements: &[LayerConfig]) -> Vec<String> {
        elements.iter().filter_map(LayerConfig::id_str).collect()
    }

    #[test]
    fn groups_by_category_and_collapses_singletons() {
        let layers = vec![
            raw("1", json!(["A"]), "M1"),
            raw("2", json!(["A"]), "M1"),
            raw("3", json!(["B"]), "M2"),
        ];
        let catalog = InMemoryRawLayerList::from_layers(layers.clone());
        let mut ids = IdGenerator::new();
        let result = TreeBuilder::new(&mut ids).build(request(&layers, &catalog));

        let groups = result.elements.as_ref().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name.as_deref(), Some("A"));
        assert_eq!(groups[1].name.as_deref(), Some("B"));

        let a = groups[0].elements.as_ref().unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].kind, LayerType::Folder);
        assert_eq!(a[0].name.as_deref(), Some("M1"));
        assert_eq!(ids_of(a[0].elements.as_ref().unwrap()), vec!["1", "2"]);

        let b = groups[1].elements.as_ref().unwrap();
        assert_eq!(ids_of(b), vec!["3"]);
        assert_eq!(b[0].kind, LayerType::Layer);
    }

    #[test]
    fn shared_metadata_name_gets_subfolder_next_to_single_layer() {
        let layers = vec![
            raw("x1", json!("Umwelt"), "X"),
            raw("y", json!("Umwelt"), "Y"),
            raw("x2", json!("Umwelt"), "X"),
        ];
        let catalog = InMemoryRawLayerList::from_layers(layers.clone());
        let mut ids = IdGenerator::new();
        let result = TreeBuilder::new(&mut ids).build(request(&layers, &catalog));

        let groups = result.elements.unwrap();
        assert_eq!(groups.len(), 1);
        let umwelt = groups[0].elements.as_ref().unwrap();
        assert_eq!(umwelt.len(), 2);
        // Sorted by name: "Layer y" < "X".
        assert_eq!(umwelt[0].id_str().as_deref(), Some("y"));
        assert_eq!(umwelt[1].name.as_deref(), Some("X"));
        assert_eq!(ids_of(umwelt[1].elements.as_ref().unwrap()), vec!["x1", "x2"]);
    }

    #[test]
    fn metadata_name_shared_across_categories_stays_flat() {
        let layers = vec![
            raw("1", json!(["A"]), "M"),
            raw("2", json!(["B"]), "M"),
        ];
        let catalog = InMemoryRawLayerList::from_layers(layers.clone());
        let mut ids = IdGenerator::new();
        let result = TreeBuilder::new(&mut ids).build(request(&layers, &catalog));

        let groups = result.elements.unwrap();
        assert_eq!(groups.len(), 2);
        for (group, id) in groups.iter().zip(["1", "2"]) {
            let children = group.elements.as_ref().unwrap();
            assert_eq!(ids_of(children), vec![id]);
            assert_eq!(children[0].kind, LayerType::Layer);
            assert_eq!(children[0].parent_id, group.id_str());
        }
    }

    #[test]
    fn every_child_points_at_its_container() {
        let layers = vec![
            raw("1", json!("A"), "M1"),
            raw("2", json!("A"), "M1"),
            raw("3", json!("A"), "M2"),
        ];
        let catalog = InMemoryRawLayerList::from_layers(layers.clone());
        let mut ids = IdGenerator::new();
        let result = TreeBuilder::new(&mut ids).build(request(&layers, &catalog));

        let group = &result.elements.as_ref().unwrap()[0];
        let group_id = group.id_str().unwrap();
        assert!(group_id.starts_with(FOLDER_ID_PREFIX));
        assert_eq!(group.parent_id, None);
        for child in group.elements.as_ref().unwrap() {
            assert_eq!(child.parent_id.as_deref(), Some(group_id.as_str()));
            if let Some(grandchildren) = &child.elements {
                let sub_id = child.id_str().unwrap();
                assert_ne!(sub_id, group_id);
                for g in grandchildren {
                    assert_eq!(g.parent_id.as_deref(), Some(sub_id.as_str()));
                }
            }
        }
    }

    #[test]
    fn baselayer_ids_never_appear() {
        let layers = vec![raw("bg", json!("A"), "M"), raw("1", json!("A"), "M1")];
        let catalog = InMemoryRawLayerList::from_layers(layers.clone());
        let baselayer = LayerConfig::container(vec![LayerConfig::layer("bg")]);
        let mut ids = IdGenerator::new();
        let mut req = request(&layers, &catalog);
        req.baselayer = Some(&baselayer);
        let result = TreeBuilder::new(&mut ids).build(req);

        let all: Vec<String> = result.leaves().iter().filter_map(|l| l.id_str()).collect();
        assert_eq!(all, vec!["1"]);
    }

    #[test]
    fn subject_layers_pass_through_when_all_are_3d() {
        let layers = vec![
            raw("1", json!("A"), "M1"),
            RawLayer::new("t")
                .with_attribute("typ", json!("TILESET3D"))
                .with_attribute("datasets", json!([{"kategorie_opendata": "A", "md_name": "T"}])),
        ];
        let catalog = InMemoryRawLayerList::from_layers(layers.clone());
        let subject = LayerConfig::container(vec![LayerConfig::layer("t")]);
        let mut ids = IdGenerator::new();
        let mut req = request(&layers, &catalog);
        req.subjectlayer = Some(&subject);
        let result = TreeBuilder::new(&mut ids).build(req);

        let elements = result.elements.unwrap();
        assert_eq!(elements[0].id_str().as_deref(), Some("t"));
        assert_eq!(elements.len(), 2);
        assert_eq!(ids_of(elements[1].elements.as_ref().unwrap()), vec!["1"]);
    }

    #[test]
    fn mixed_subject_layers_are_regrouped() {
        let layers = vec![raw("1", json!("A"), "M1")];
        let catalog = InMemoryRawLayerList::from_layers(layers.clone());
        let subject = LayerConfig::container(vec![LayerConfig::layer("1")]);
        let mut ids = IdGenerator::new();
        let mut req = request(&layers, &catalog);
        req.subjectlayer = Some(&subject);
        let result = TreeBuilder::new(&mut ids).build(req);
        assert_eq!(result.elements.unwrap()[0].name.as_deref(), Some("A"));
    }

    #[test]
    fn overrides_survive_rebuild() {
        let layers = vec![raw("1", json!("A"), "M1")];
        let catalog = InMemoryRawLayerList::from_layers(layers.clone());
        let mut custom = LayerConfig::layer("1");
        custom.name = Some("Renamed".into());
        custom.visibility = Some(true);
        let overrides = vec![custom];
        let mut ids = IdGenerator::new();
        let mut req = request(&layers, &catalog);
        req.first_level_overrides = &overrides;
        let result = TreeBuilder::new(&mut ids).build(req);

        let leaf = result.leaves()[0].clone();
        assert_eq!(leaf.name.as_deref(), Some("Renamed"));
        assert_eq!(leaf.visibility, Some(true));
        assert_eq!(leaf.typ(), Some("WMS"));
    }

    #[test]
    fn unclassified_and_malformed_records_are_skipped() {
        let layers = vec![
            RawLayer::new("no-datasets"),
            RawLayer::new("bad").with_attribute("datasets", json!({"md_name": "x"})),
            RawLayer::new("other-key").with_attribute("datasets", json!([{"inspire": "A"}])),
            raw("ok", json!("A"), "M"),
        ];
        let catalog = InMemoryRawLayerList::from_layers(layers.clone());
        let mut ids = IdGenerator::new();
        let result = TreeBuilder::new(&mut ids).build(request(&layers, &catalog));
        let all: Vec<String> = result.leaves().iter().filter_map(|l| l.id_str()).collect();
        assert_eq!(all, vec!["ok"]);
    }

    #[test]
    fn no_category_passes_catalog_through() {
        let layers = vec![raw("1", json!("A"), "M1"), raw("2", json!("B"), "M2")];
        let catalog = InMemoryRawLayerList::from_layers(layers.clone());
        let mut ids = IdGenerator::new();
        let mut req = request(&layers, &catalog);
        req.category_key = None;
        let result = TreeBuilder::new(&mut ids).build(req);
        assert_eq!(ids_of(result.elements.as_ref().unwrap()), vec!["1", "2"]);
        assert_eq!(ids.peek(), 1);
    }

    #[test]
    fn set_ids_at_folders_assigns_ids_and_parents() {
        let mut folder: LayerConfig = serde_json::from_value(json!({
            "type": "folder",
            "name": "top",
            "elements": [
                {"id": "l1"},
                {"type": "folder", "name": "inner", "elements": [{"id": "l2"}]}
            ]
        }))
        .unwrap();
        let mut ids = IdGenerator::new();
        TreeBuilder::new(&mut ids).set_ids_at_folders([&mut folder]);

        assert_eq!(folder.id_str().as_deref(), Some("folder-1"));
        let children = folder.elements.as_ref().unwrap();
        assert_eq!(children[0].parent_id.as_deref(), Some("folder-1"));
        assert_eq!(children[1].id_str().as_deref(), Some("folder-2"));
        assert_eq!(children[1].parent_id.as_deref(), Some("folder-1"));
        let inner = children[1].elements.as_ref().unwrap();
        assert_eq!(inner[0].parent_id.as_deref(), Some("folder-2"));
    }
}
