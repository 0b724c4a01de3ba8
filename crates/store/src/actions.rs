//! Store actions: multi-step operations over state, catalog, registry and
//! the action bus.
//!
//! Every action takes `&mut self` and runs to completion before the next
//! one can start, so two calls can never interleave on the same store.

use catalog::RawLayerSource;
use foundation::IdGenerator;
use layers::merge::{get_and_merge_all_raw_layers, get_and_merge_raw_layer};
use layers::{
    BuildRequest, LayerCollection, LayerConfig, LayerId, LayerPatch, LayerType, MapEngine,
    RecordingMapEngine, TreeBuilder, runtime_layer_for,
};
use runtime::{Action, ActionBus, Alert};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{Category, ConfigDocument};
use crate::mutations::LayerContainer;
use crate::state::{BASELAYER_KEY, SUBJECTLAYER_KEY, State};

/// Attribution text providers use for "no attribution".
pub const ATTRIBUTION_NOT_AVAILABLE: &str = "nicht vorhanden";

/// Folder name the layer selection starts from after a recategorisation.
pub const ROOT_FOLDER_NAME: &str = "root";

/// One entry of [`AppStore::replace_by_id_in_layer_config`].
#[derive(Debug, Clone, PartialEq)]
pub struct LayerReplacement {
    pub id: LayerId,
    pub layer: LayerPatch,
}

impl LayerReplacement {
    pub fn new(id: impl Into<LayerId>, layer: LayerPatch) -> Self {
        Self {
            id: id.into(),
            layer,
        }
    }
}

/// Parameters of [`AppStore::add_or_replace_layer`].
#[derive(Debug, Clone, PartialEq)]
pub struct AddOrReplaceLayer {
    pub layer_id: String,
    pub visibility: bool,
    pub transparency: u32,
    pub show_in_layer_tree: bool,
    pub is_base_layer: bool,
    pub z_index: Option<i64>,
}

impl AddOrReplaceLayer {
    pub fn new(layer_id: impl Into<String>) -> Self {
        Self {
            layer_id: layer_id.into(),
            visibility: true,
            transparency: 0,
            show_in_layer_tree: true,
            is_base_layer: false,
            z_index: None,
        }
    }

    pub fn base_layer(mut self) -> Self {
        self.is_base_layer = true;
        self
    }

    pub fn visibility(mut self, visibility: bool) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn transparency(mut self, transparency: u32) -> Self {
        self.transparency = transparency;
        self
    }

    pub fn z_index(mut self, z_index: i64) -> Self {
        self.z_index = Some(z_index);
        self
    }
}

/// Layer configuration store bound to one catalog, one runtime registry and
/// one action bus.
pub struct AppStore<E: MapEngine = RecordingMapEngine> {
    state: State,
    ids: IdGenerator,
    catalog: Box<dyn RawLayerSource>,
    collection: LayerCollection<E>,
    bus: ActionBus,
}

impl AppStore<RecordingMapEngine> {
    pub fn new(catalog: impl RawLayerSource + 'static) -> Self {
        Self::with_engine(catalog, RecordingMapEngine::new())
    }
}

impl<E: MapEngine> AppStore<E> {
    pub fn with_engine(catalog: impl RawLayerSource + 'static, engine: E) -> Self {
        Self {
            state: State::new(),
            ids: IdGenerator::new(),
            catalog: Box::new(catalog),
            collection: LayerCollection::new(engine),
            bus: ActionBus::new(),
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Direct access for committing mutations.
    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    pub fn catalog(&self) -> &dyn RawLayerSource {
        self.catalog.as_ref()
    }

    pub fn collection(&self) -> &LayerCollection<E> {
        &self.collection
    }

    pub fn collection_mut(&mut self) -> &mut LayerCollection<E> {
        &mut self.collection
    }

    pub fn bus(&self) -> &ActionBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut ActionBus {
        &mut self.bus
    }

    /// Adds `layer_config` below `parent_key` (a partition key or folder id)
    /// at the top of the z-order.
    ///
    /// Returns `false` without touching anything when the id is configured
    /// anywhere already.
    pub fn add_layer_to_layer_config(&mut self, mut layer_config: LayerConfig, parent_key: &str) -> bool {
        let Some(id) = layer_config.id.clone() else {
            warn!("layer configuration without id cannot be added to '{parent_key}'");
            return false;
        };
        if let Some(configured) = self.state.layer_config_sharing_id(&id) {
            debug!("layer {id} is already configured as {}", configured.id_str().unwrap_or_default());
            return false;
        }

        let (container, max_z_index) = if State::is_partition_key(parent_key) {
            (
                LayerContainer::Partition(parent_key.to_string()),
                self.state.max_z_index_of_layer_configs_by_parent_key(parent_key),
            )
        } else {
            let max = self
                .state
                .visible_subject_data_layer_configs()
                .iter()
                .filter_map(|c| c.z_index)
                .max()
                .unwrap_or(-1);
            (LayerContainer::VisibleSubjectLayers, max)
        };
        // Nothing is above the maximum it was derived from, so this is
        // normally inert.
        self.update_layer_config_z_index(&container, max_z_index);
        layer_config.z_index = Some(max_z_index + 1);

        let added = self.state.push_layer(parent_key, layer_config);
        self.add_baselayer_attribute();
        if added {
            self.state.touch();
        }
        added
    }

    /// Merges each replacement into the configurations with its id.
    ///
    /// A replacement that turns an unnumbered layer visible gets a fresh
    /// `zIndex`. Visibility changes reach the runtime layer, and every
    /// payload is checked for an attribution to announce.
    pub fn replace_by_id_in_layer_config(&mut self, layer_configs: Vec<LayerReplacement>, trigger: bool) {
        for LayerReplacement { id, mut layer } in layer_configs {
            let previous = self.state.layer_config_by_id(&id).cloned();
            if let Some(previous) = &previous {
                if previous.z_index.is_none() && layer.z_index.is_none() && layer.visibility == Some(true) {
                    layer.z_index = self.state.determine_z_index(&id);
                }
            }

            let merged = self.state.replace_by_id(&id, &layer);
            if merged.len() > 1 {
                warn!("layer id {id} is configured {} times; all were replaced", merged.len());
            }

            if let (Some(previous), Some(visible)) = (&previous, layer.visibility) {
                if previous.visibility == Some(!visible) {
                    if let Some(runtime) = self.collection.get_layer_by_id_mut(&id.to_string()) {
                        runtime.visibility_changed(visible);
                    }
                }
            }

            self.show_layer_attributions(&layer);
        }

        if trigger {
            self.state.touch();
        }
    }

    /// Adds a catalog layer or updates the presentation of a configured one.
    ///
    /// Returns `false` only when a new layer is missing from the catalog.
    pub fn add_or_replace_layer(&mut self, params: AddOrReplaceLayer) -> bool {
        let requested = LayerId::from(params.layer_id.clone());
        let existing = self.state.layer_config_sharing_id(&requested).cloned();

        let Some(existing) = existing else {
            let Some(raw) = self.catalog.layer_by_id(&params.layer_id) else {
                warn!("layer {} is not in the catalog", params.layer_id);
                return false;
            };
            let id = requested;
            let parent_key = if params.is_base_layer {
                BASELAYER_KEY
            } else {
                SUBJECTLAYER_KEY
            };
            let mut config = LayerConfig::from_raw(raw);
            config.kind = LayerType::Layer;
            config.visibility = Some(params.visibility);
            config.transparency = Some(params.transparency);
            config.show_in_layer_tree = Some(params.show_in_layer_tree);
            config.z_index = Some(
                params
                    .z_index
                    .unwrap_or_else(|| self.state.next_z_index_for(parent_key)),
            );

            if params.is_base_layer && params.visibility {
                self.hide_other_baselayers(&id);
            }
            self.add_layer_to_layer_config(config, parent_key);
            return true;
        };
        // Updates go to the configured entry, which may be an array id
        // containing the requested one.
        let id = existing.id.clone().unwrap_or(requested);

        let z_index = match params.z_index {
            Some(z) => Some(z),
            None if existing.show_in_layer_tree != Some(true) && params.visibility => {
                let key = if self.state.is_baselayer(&id) {
                    BASELAYER_KEY
                } else {
                    SUBJECTLAYER_KEY
                };
                Some(self.state.next_z_index_for(key))
            }
            None => existing.z_index,
        };

        if params.visibility && self.state.is_baselayer(&id) {
            self.hide_other_baselayers(&id);
        }
        let patch = LayerPatch {
            visibility: Some(params.visibility),
            transparency: Some(params.transparency),
            show_in_layer_tree: Some(params.show_in_layer_tree),
            z_index,
            ..LayerPatch::default()
        };
        self.replace_by_id_in_layer_config(vec![LayerReplacement { id, layer: patch }], true);
        true
    }

    /// With `singleBaselayer`, switches off every visible baselayer but `keep`.
    fn hide_other_baselayers(&mut self, keep: &LayerId) {
        if !self.state.portal_config.tree.single_baselayer {
            return;
        }
        let others: Vec<LayerReplacement> = self
            .state
            .visible_baselayer_configs()
            .into_iter()
            .filter_map(|c| c.id.clone())
            .filter(|id| id != keep)
            .map(|id| LayerReplacement::new(id, LayerPatch::visibility(false)))
            .collect();
        if !others.is_empty() {
            debug!("single baselayer: hiding {} baselayers", others.len());
            self.replace_by_id_in_layer_config(others, false);
        }
    }

    /// Makes room above `max_z_index` in `layer_container`.
    pub fn update_layer_config_z_index(&mut self, layer_container: &LayerContainer, max_z_index: i64) {
        self.state.shift_z_indexes_above(layer_container, max_z_index);
    }

    /// Compacts the z-order of both partitions into `1..=k`.
    pub fn update_all_z_indexes(&mut self) {
        self.state.renumber_z_indexes();
        self.state.touch();
    }

    /// Completes a freshly loaded configuration: flags baselayers, builds or
    /// links the folder tree and merges catalog data into every layer.
    pub fn extend_layers(&mut self) {
        self.add_baselayer_attribute();
        if self.state.portal_config.tree.is_auto() {
            let container: Vec<LayerConfig> = self
                .state
                .all_layer_configs_by_parent_key(SUBJECTLAYER_KEY)
                .into_iter()
                .cloned()
                .collect();
            self.process_tree_type_auto(&container);
        } else {
            self.state.assign_folder_ids(&mut self.ids);
        }
        let all: Vec<LayerConfig> = self.state.all_layer_configs().into_iter().cloned().collect();
        self.update_layer_configs(&all);
    }

    /// Rebuilds the subject-data partition from the catalog, grouped by the
    /// active (or first) category. `layer_container` carries the user's
    /// customisations of first-level layers.
    pub fn process_tree_type_auto(&mut self, layer_container: &[LayerConfig]) {
        let category = self
            .state
            .active_or_first_category()
            .map(|c| c.key.clone());
        let built = self.build_subject_tree(category.as_deref(), layer_container);
        self.state.set_layer_config_by_parent_key(SUBJECTLAYER_KEY, built);
    }

    /// Regroups the subject-data partition by `category` and sends the layer
    /// selection back to its root.
    pub fn change_category(&mut self, category: &Category) {
        let container: Vec<LayerConfig> = self
            .state
            .all_layer_configs_by_parent_key(SUBJECTLAYER_KEY)
            .into_iter()
            .cloned()
            .collect();
        let built = self.build_subject_tree(Some(&category.key), &container);
        let first_level = built.elements.clone().unwrap_or_default();
        self.state.set_layer_config_by_parent_key(SUBJECTLAYER_KEY, built);
        self.state.activate_category(&category.key);

        self.bus.dispatch(Action::ResetLayerSelection);
        let sub_elements: Vec<Value> = first_level
            .iter()
            .chain(self.state.invisible_baselayer_configs())
            .filter_map(|c| serde_json::to_value(c).ok())
            .collect();
        self.bus.dispatch(Action::NavigateForward {
            last_folder_names: vec![ROOT_FOLDER_NAME.to_string()],
            sub_elements,
        });
    }

    fn build_subject_tree(&mut self, category_key: Option<&str>, overrides: &[LayerConfig]) -> LayerConfig {
        let tree = &self.state.portal_config.tree;
        let raw_layers = get_and_merge_all_raw_layers(
            self.catalog.as_ref(),
            &tree.valid_layer_types(),
            &tree.layer_ids_to_ignore,
            tree.show_layer_add_button(),
        );
        let request = BuildRequest {
            raw_layers: &raw_layers,
            baselayer: self.state.layer_config.get(BASELAYER_KEY),
            subjectlayer: self.state.layer_config.get(SUBJECTLAYER_KEY),
            category_key,
            first_level_overrides: overrides,
            catalog: self.catalog.as_ref(),
        };
        TreeBuilder::new(&mut self.ids).build(request)
    }

    /// Merges catalog data into every layer of `layer_container`.
    ///
    /// With `singleBaselayer`, only the first visible baselayer stays visible.
    pub fn update_layer_configs(&mut self, layer_container: &[LayerConfig]) {
        let show_layer_add_button = self.state.show_layer_add_button();
        let single_baselayer = self.state.portal_config.tree.single_baselayer;
        let mut visible_baselayer_seen = false;

        for config in layer_container {
            let Some(merged) = get_and_merge_raw_layer(config, self.catalog.as_ref(), show_layer_add_button) else {
                continue;
            };
            let Some(id) = merged.id.clone() else {
                continue;
            };
            let mut patch = LayerPatch::from(merged);
            if patch.visibility == Some(true) && self.state.is_baselayer(&id) {
                if single_baselayer && visible_baselayer_seen {
                    patch.visibility = Some(false);
                }
                visible_baselayer_seen = true;
            }
            self.replace_by_id_in_layer_config(vec![LayerReplacement { id, layer: patch }], true);
        }
    }

    /// Requests a one-time alert for the attribution of a visible layer.
    pub fn show_layer_attributions(&mut self, layer_attributes: &LayerPatch) {
        if layer_attributes.visibility != Some(true) {
            return;
        }
        let Some(attribution) = layer_attributes
            .attribute("layerAttribution")
            .and_then(Value::as_str)
        else {
            return;
        };
        if attribution.is_empty() || attribution == ATTRIBUTION_NOT_AVAILABLE {
            return;
        }
        let mut alert = Alert::info(attribution).once();
        alert.title = layer_attributes.name.clone();
        self.bus.dispatch(Action::AddSingleAlert(alert));
    }

    pub fn add_baselayer_attribute(&mut self) {
        self.state.stamp_baselayer();
    }

    /// Replaces the whole configuration with `document` and completes it.
    pub fn process_config_json_onload(&mut self, document: ConfigDocument) {
        self.collection.clear();
        self.state.set_portal_config(document.portal_config);
        self.state.replace_layer_config(document.layer_config);
        for duplicate in self.state.duplicate_layer_ids() {
            warn!(
                "layer id {} occurs {} times in '{}'",
                duplicate.id, duplicate.occurrences, duplicate.partition
            );
        }
        self.extend_layers();
    }

    /// Creates runtime layers for every visible configuration not yet
    /// registered. Returns how many were added.
    pub fn register_visible_layers(&mut self) -> usize {
        let mut added = 0;
        for config in self.state.visible_layer_configs() {
            let Some(id) = config.id_str() else {
                continue;
            };
            if self.collection.get_layer_by_id(&id).is_some() {
                continue;
            }
            if let Some(layer) = runtime_layer_for(config) {
                self.collection.add_layer(layer);
                added += 1;
            }
        }
        added
    }
}
