use crate::config::LayerConfig;
use crate::layer::{Dimension, RuntimeLayer};
use crate::symbology::LayerStyle;

/// Layer rendered by the 3D globe (terrain, tilesets, oblique imagery).
#[derive(Debug, Clone, PartialEq)]
pub struct Layer3d {
    id: String,
    pub style: LayerStyle,
    /// Set once the layer was explicitly switched off in the scene.
    pub hidden_in_scene: bool,
}

impl Layer3d {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            style: LayerStyle::default(),
            hidden_in_scene: false,
        }
    }

    pub fn from_config(config: &LayerConfig) -> Self {
        Self {
            id: config.id_str().unwrap_or_default(),
            style: LayerStyle::from_config(config),
            hidden_in_scene: false,
        }
    }
}

impl RuntimeLayer for Layer3d {
    fn id(&self) -> &str {
        &self.id
    }

    fn dimension(&self) -> Dimension {
        Dimension::Map3d
    }

    fn is_visible(&self) -> bool {
        self.style.visible
    }

    fn set_visible(&mut self, visible: bool) {
        self.style.visible = visible;
        if visible {
            self.hidden_in_scene = false;
        }
    }

    fn hide_in_3d(&mut self) {
        self.style.visible = false;
        self.hidden_in_scene = true;
    }
}
