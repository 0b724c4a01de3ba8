use crate::config::LayerConfig;
use crate::layer::{Dimension, RuntimeLayer};
use crate::symbology::LayerStyle;

/// Layer rendered by the 2D map.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer2d {
    id: String,
    pub style: LayerStyle,
}

impl Layer2d {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            style: LayerStyle::default(),
        }
    }

    pub fn from_config(config: &LayerConfig) -> Self {
        Self {
            id: config.id_str().unwrap_or_default(),
            style: LayerStyle::from_config(config),
        }
    }
}

impl RuntimeLayer for Layer2d {
    fn id(&self) -> &str {
        &self.id
    }

    fn dimension(&self) -> Dimension {
        Dimension::Map2d
    }

    fn is_visible(&self) -> bool {
        self.style.visible
    }

    fn set_visible(&mut self, visible: bool) {
        self.style.visible = visible;
    }
}
