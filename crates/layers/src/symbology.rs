use crate::config::LayerConfig;

/// Presentation state a runtime layer pushes to its map engine.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LayerStyle {
    pub visible: bool,
    /// 0.0 (transparent) to 1.0 (opaque).
    pub opacity: f32,
    pub z_index: Option<i64>,
}

impl LayerStyle {
    /// Derives the style from configuration; `transparency` is a percentage.
    pub fn from_config(config: &LayerConfig) -> Self {
        let transparency = config.transparency.unwrap_or(0).min(100) as f32;
        Self {
            visible: config.is_visible(),
            opacity: 1.0 - transparency / 100.0,
            z_index: config.z_index,
        }
    }
}

impl Default for LayerStyle {
    fn default() -> Self {
        Self {
            visible: true,
            opacity: 1.0,
            z_index: None,
        }
    }
}
