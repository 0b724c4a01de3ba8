use std::fmt::Debug;

use crate::config::LayerConfig;
use crate::layer2d::Layer2d;
use crate::layer3d::Layer3d;
use crate::tree_builder::is_3d_layer_type;

/// Which map engine renders a runtime layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Dimension {
    Map2d,
    Map3d,
}

/// Runtime wrapper around a map-engine layer, registered in the
/// [`LayerCollection`](crate::collection::LayerCollection) under the id of
/// its configuration.
pub trait RuntimeLayer: Debug {
    fn id(&self) -> &str;

    fn dimension(&self) -> Dimension;

    fn is_visible(&self) -> bool;

    fn set_visible(&mut self, visible: bool);

    /// Called by the configuration store when `visibility` flips.
    fn visibility_changed(&mut self, visible: bool) {
        self.set_visible(visible);
    }

    /// Turns the layer off in the 3D scene.
    fn hide_in_3d(&mut self) {
        self.set_visible(false);
    }
}

/// Creates the wrapper matching the configuration's service type.
pub fn runtime_layer_for(config: &LayerConfig) -> Option<Box<dyn RuntimeLayer>> {
    config.id.as_ref()?;
    if config.typ().is_some_and(is_3d_layer_type) {
        Some(Box::new(Layer3d::from_config(config)))
    } else {
        Some(Box::new(Layer2d::from_config(config)))
    }
}
