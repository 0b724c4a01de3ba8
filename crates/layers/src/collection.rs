//! Registry of live runtime layers.

use std::fmt::Debug;

use tracing::debug;

use crate::layer::{Dimension, RuntimeLayer};

/// The 2D map engine as seen by the registry.
pub trait MapEngine: Debug {
    fn add_layer(&mut self, layer: &dyn RuntimeLayer);
    fn remove_layer(&mut self, id: &str);
}

/// Map engine stand-in that records which layers are on the map.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordingMapEngine {
    on_map: Vec<String>,
    removed: Vec<String>,
}

impl RecordingMapEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids currently on the map, in insertion order.
    pub fn on_map(&self) -> &[String] {
        &self.on_map
    }

    /// Every removal request received, in order.
    pub fn removed(&self) -> &[String] {
        &self.removed
    }
}

impl MapEngine for RecordingMapEngine {
    fn add_layer(&mut self, layer: &dyn RuntimeLayer) {
        self.on_map.push(layer.id().to_string());
    }

    fn remove_layer(&mut self, id: &str) {
        self.on_map.retain(|l| l != id);
        self.removed.push(id.to_string());
    }
}

/// Live mapping from configuration id to runtime layer.
///
/// 2D layers are mirrored onto the map engine on add and detached on removal;
/// 3D layers are managed by the globe and only switched off on [`clear`].
///
/// [`clear`]: LayerCollection::clear
#[derive(Debug, Default)]
pub struct LayerCollection<E: MapEngine = RecordingMapEngine> {
    layers: Vec<Box<dyn RuntimeLayer>>,
    engine: E,
}

impl<E: MapEngine> LayerCollection<E> {
    pub fn new(engine: E) -> Self {
        Self {
            layers: Vec::new(),
            engine,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn add_layer(&mut self, layer: Box<dyn RuntimeLayer>) {
        if layer.dimension() == Dimension::Map2d {
            self.engine.add_layer(&*layer);
        }
        debug!("layer {} registered", layer.id());
        self.layers.push(layer);
    }

    /// Removes every entry with `id`. Duplicates are tolerated.
    pub fn remove_layer_by_id(&mut self, id: &str) {
        let on_2d_map = self
            .layers
            .iter()
            .any(|l| l.id() == id && l.dimension() == Dimension::Map2d);
        if on_2d_map {
            self.engine.remove_layer(id);
        }
        self.layers.retain(|l| l.id() != id);
    }

    /// Switches every layer off, detaches 2D layers from the map and empties
    /// the registry.
    pub fn clear(&mut self) {
        for layer in self.layers.iter_mut() {
            match layer.dimension() {
                Dimension::Map2d => {
                    layer.set_visible(false);
                    self.engine.remove_layer(layer.id());
                }
                Dimension::Map3d => layer.hide_in_3d(),
            }
        }
        self.layers.clear();
    }

    pub fn get_layers(&self) -> &[Box<dyn RuntimeLayer>] {
        &self.layers
    }

    pub fn get_layer_by_id(&self, id: &str) -> Option<&dyn RuntimeLayer> {
        self.layers.iter().find(|l| l.id() == id).map(|l| &**l)
    }

    pub fn get_layer_by_id_mut(&mut self, id: &str) -> Option<&mut dyn RuntimeLayer> {
        self.layers
            .iter_mut()
            .find(|l| l.id() == id)
            .map(|l| &mut **l as &mut dyn RuntimeLayer)
    }

    /// 2D layers currently visible on the map.
    pub fn get_ol_layers(&self) -> Vec<&dyn RuntimeLayer> {
        self.layers
            .iter()
            .filter(|l| l.dimension() == Dimension::Map2d && l.is_visible())
            .map(|l| &**l)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer2d::Layer2d;
    use crate::layer3d::Layer3d;

    fn collection() -> LayerCollection {
        LayerCollection::new(RecordingMapEngine::new())
    }

    #[test]
    fn only_2d_layers_reach_the_map() {
        let mut c = collection();
        c.add_layer(Box::new(Layer2d::new("wms")));
        c.add_layer(Box::new(Layer3d::new("tiles")));
        assert_eq!(c.len(), 2);
        assert_eq!(c.engine().on_map(), ["wms".to_string()]);
        assert_eq!(c.get_layer_by_id("tiles").map(|l| l.dimension()), Some(Dimension::Map3d));
    }

    #[test]
    fn remove_tolerates_duplicates() {
        let mut c = collection();
        c.add_layer(Box::new(Layer2d::new("a")));
        c.add_layer(Box::new(Layer2d::new("a")));
        c.add_layer(Box::new(Layer2d::new("b")));
        c.remove_layer_by_id("a");
        assert_eq!(c.len(), 1);
        assert!(c.get_layer_by_id("a").is_none());
        c.remove_layer_by_id("missing");
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn clear_detaches_and_hides_everything() {
        let mut c = collection();
        c.add_layer(Box::new(Layer2d::new("a")));
        c.add_layer(Box::new(Layer3d::new("t")));
        c.clear();
        assert!(c.is_empty());
        assert!(c.engine().on_map().is_empty());
        assert_eq!(c.engine().removed(), ["a".to_string()]);
    }

    #[test]
    fn ol_layers_are_visible_2d_layers() {
        let mut c = collection();
        c.add_layer(Box::new(Layer2d::new("a")));
        let mut hidden = Layer2d::new("b");
        hidden.style.visible = false;
        c.add_layer(Box::new(hidden));
        c.add_layer(Box::new(Layer3d::new("t")));
        let ol = c.get_ol_layers();
        let ids: Vec<&str> = ol.iter().map(|l| l.id()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn visibility_change_reaches_the_wrapper() {
        let mut c = collection();
        c.add_layer(Box::new(Layer2d::new("a")));
        if let Some(layer) = c.get_layer_by_id_mut("a") {
            layer.visibility_changed(false);
        }
        assert_eq!(c.get_layer_by_id("a").map(|l| l.is_visible()), Some(false));
    }
}
