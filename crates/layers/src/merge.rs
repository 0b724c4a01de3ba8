//! Merging catalog records with persisted layer configuration.

use catalog::{RawLayer, RawLayerSource};
use serde_json::Value;
use tracing::debug;

use crate::config::{LayerConfig, LayerId, LayerPatch};

/// Default for `validLayerTypesAutoTree`.
pub const DEFAULT_VALID_LAYER_TYPES_AUTO_TREE: [&str; 5] =
    ["WMS", "SENSORTHINGS", "TERRAIN3D", "TILESET3D", "OBLIQUE"];

/// Catalog records eligible for the automatic tree.
///
/// Keeps records whose `typ` is listed in `valid_types` and whose id is not
/// ignored. Records without `showInLayerTree` get `!show_layer_add_button`:
/// without an add button every catalog layer is listed directly.
pub fn get_and_merge_all_raw_layers(
    source: &dyn RawLayerSource,
    valid_types: &[String],
    ignore_ids: &[String],
    show_layer_add_button: bool,
) -> Vec<RawLayer> {
    source
        .layer_list()
        .iter()
        .filter(|raw| raw.typ().is_some_and(|t| valid_types.iter().any(|v| v == t)))
        .filter(|raw| !ignore_ids.contains(&raw.id))
        .map(|raw| {
            let mut raw = raw.clone();
            raw.attributes
                .entry("showInLayerTree")
                .or_insert(Value::Bool(!show_layer_add_button));
            raw
        })
        .collect()
}

/// Catalog view of `id` as a layer configuration.
///
/// Array ids start from the first record found and join the `layers`
/// attribute of every listed record with `,`.
pub fn raw_layer_config(id: &LayerId, source: &dyn RawLayerSource) -> Option<LayerConfig> {
    let records: Vec<&RawLayer> = id.parts().filter_map(|p| source.layer_by_id(p)).collect();
    let first = records.first()?;
    let mut config = LayerConfig::from_raw(first);
    if let LayerId::Multi(_) = id {
        let layers: Vec<&str> = records
            .iter()
            .filter_map(|r| r.attribute("layers").and_then(Value::as_str))
            .collect();
        if !layers.is_empty() {
            config
                .attributes
                .insert("layers".to_string(), Value::String(layers.join(",")));
        }
    }
    config.id = Some(id.clone());
    Some(config)
}

/// Merges the catalog record of `config` with `config` itself.
///
/// With the add button shown the persisted configuration wins. Without it the
/// catalog overwrites persisted fields, except presentation and tree state
/// which always belong to the portal configuration.
pub fn get_and_merge_raw_layer(
    config: &LayerConfig,
    source: &dyn RawLayerSource,
    show_layer_add_button: bool,
) -> Option<LayerConfig> {
    let id = config.id.as_ref()?;
    let Some(mut raw) = raw_layer_config(id, source) else {
        debug!("layer {id} has no catalog record");
        return None;
    };

    if show_layer_add_button {
        raw.apply(&LayerPatch::from(config.clone()));
        return Some(raw);
    }

    let mut catalog_patch = LayerPatch::from(raw);
    catalog_patch.id = None;
    catalog_patch.kind = None;
    catalog_patch.name = None;
    catalog_patch.z_index = None;
    catalog_patch.visibility = None;
    catalog_patch.show_in_layer_tree = None;
    catalog_patch.transparency = None;
    catalog_patch.baselayer = None;
    catalog_patch.parent_id = None;
    catalog_patch.elements = None;

    let mut merged = config.clone();
    merged.apply(&catalog_patch);
    if merged.name.is_none() {
        merged.name = raw_layer_config(id, source).and_then(|r| r.name);
    }
    Some(merged)
}
