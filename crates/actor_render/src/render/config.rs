//! Renderer configuration

use serde::{Deserialize, Serialize};

use super::actor::PackingStrategy;
use super::blend::BlendMode;
use crate::config::Config;

/// Bone table size of the stock skinning shader
pub const DEFAULT_MAX_BONES_PER_DRAW: usize = 82;

/// Configuration for the actor renderer
///
/// Every field has a default, so a config file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// How actor definitions lay out their GPU buffers
    pub packing_strategy: PackingStrategy,
    /// Largest bone table a skinned draw may carry
    pub max_bones_per_draw: usize,
    /// Blend mode emitted at the start of every frame
    pub initial_blend_mode: BlendMode,
    /// RGBA tint applied to every draw (0.0-1.0 range)
    pub tint: [f32; 4],
    /// File extension of actor textures, without the dot
    pub texture_extension: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            packing_strategy: PackingStrategy::default(),
            max_bones_per_draw: DEFAULT_MAX_BONES_PER_DRAW,
            initial_blend_mode: BlendMode::Transparent,
            tint: [1.0, 1.0, 1.0, 1.0],
            texture_extension: "png".to_string(),
        }
    }
}

impl RenderConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the buffer packing strategy
    pub fn with_packing_strategy(mut self, strategy: PackingStrategy) -> Self {
        self.packing_strategy = strategy;
        self
    }

    /// Set the bone table size
    pub fn with_max_bones_per_draw(mut self, max_bones: usize) -> Self {
        self.max_bones_per_draw = max_bones.max(1);
        self
    }

    /// Set the blend mode emitted at the start of every frame
    pub fn with_initial_blend_mode(mut self, mode: BlendMode) -> Self {
        self.initial_blend_mode = mode;
        self
    }

    /// Set the draw tint [R, G, B, A] (0.0-1.0 range)
    pub fn with_tint(mut self, tint: [f32; 4]) -> Self {
        self.tint = tint;
        self
    }

    /// Set the texture file extension
    pub fn with_texture_extension(mut self, extension: impl Into<String>) -> Self {
        self.texture_extension = extension.into().trim_start_matches('.').to_string();
        self
    }
}

impl Config for RenderConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = RenderConfig::from_str_as(
            "packing_strategy = \"PerPartBuffers\"\nmax_bones_per_draw = 41\n",
            ConfigFormat::Toml,
        )
        .expect("Should parse partial config");

        assert_eq!(config.packing_strategy, PackingStrategy::PerPartBuffers);
        assert_eq!(config.max_bones_per_draw, 41);
        assert_eq!(config.initial_blend_mode, BlendMode::Transparent);
        assert_eq!(config.texture_extension, "png");
    }

    #[test]
    fn test_ron_round_trip() {
        let config = RenderConfig::new()
            .with_initial_blend_mode(BlendMode::Off)
            .with_tint([0.5, 0.5, 1.0, 1.0])
            .with_texture_extension(".webp");
        assert_eq!(config.texture_extension, "webp");

        let text = config.to_string_as(ConfigFormat::Ron).expect("Should serialize");
        let parsed = RenderConfig::from_str_as(&text, ConfigFormat::Ron).expect("Should parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_config_is_parse_error() {
        let result = RenderConfig::from_str_as("max_bones_per_draw = \"lots\"", ConfigFormat::Toml);
        assert!(matches!(result, Err(crate::config::ConfigError::Parse(_))));
    }
}
