use crate::color::Color;
use crate::error::SpriteBatchError;

/// Sizing and appearance of a sprite batch effect.
///
/// The defaults match the shipped game: 50 sprites per batch, 16 texture
/// slots, 3 descriptor sets and 16-bit indices.
///
/// ```
/// use starfall_render::SpriteBatchConfig;
///
/// let config = SpriteBatchConfig::default()
///     .with_max_sprites(200)
///     .with_texture_slots(8);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteBatchConfig {
    /// Sprites that fit in one batch.
    pub max_sprites: u32,
    /// Length of the texture array bound per batch.
    pub texture_slots: u32,
    /// Descriptor sets the pool can hand out.
    pub max_descriptor_sets: u32,
    pub index_format: wgpu::IndexFormat,
    pub clear_color: Color,
    pub clear_depth: f32,
    pub clear_stencil: u32,
    /// Blend factors are configured either way; this only switches them on.
    pub blend_enabled: bool,
}

impl Default for SpriteBatchConfig {
    fn default() -> Self {
        Self {
            max_sprites: 50,
            texture_slots: 16,
            max_descriptor_sets: 3,
            index_format: wgpu::IndexFormat::Uint16,
            clear_color: Color::ALICE_BLUE,
            clear_depth: 1.0,
            clear_stencil: 0,
            blend_enabled: false,
        }
    }
}

impl SpriteBatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_sprites(mut self, max_sprites: u32) -> Self {
        self.max_sprites = max_sprites;
        self
    }

    pub fn with_texture_slots(mut self, texture_slots: u32) -> Self {
        self.texture_slots = texture_slots;
        self
    }

    pub fn with_max_descriptor_sets(mut self, max_sets: u32) -> Self {
        self.max_descriptor_sets = max_sets;
        self
    }

    pub fn with_index_format(mut self, format: wgpu::IndexFormat) -> Self {
        self.index_format = format;
        self
    }

    pub fn with_clear_color(mut self, color: Color) -> Self {
        self.clear_color = color;
        self
    }

    pub fn with_clear_depth_stencil(mut self, depth: f32, stencil: u32) -> Self {
        self.clear_depth = depth;
        self.clear_stencil = stencil;
        self
    }

    pub fn with_blend(mut self, enabled: bool) -> Self {
        self.blend_enabled = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), SpriteBatchError> {
        if self.max_sprites == 0 {
            return Err(SpriteBatchError::InvalidConfig(
                "max_sprites must be at least 1".to_string(),
            ));
        }
        if self.texture_slots == 0 {
            return Err(SpriteBatchError::InvalidConfig(
                "texture_slots must be at least 1".to_string(),
            ));
        }
        if self.max_descriptor_sets == 0 {
            return Err(SpriteBatchError::InvalidConfig(
                "max_descriptor_sets must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.clear_depth) {
            return Err(SpriteBatchError::InvalidConfig(format!(
                "clear_depth {} is outside 0..=1",
                self.clear_depth
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SpriteBatchConfig::default();
        assert_eq!(config.max_sprites, 50);
        assert_eq!(config.texture_slots, 16);
        assert_eq!(config.max_descriptor_sets, 3);
        assert_eq!(config.index_format, wgpu::IndexFormat::Uint16);
        assert!(!config.blend_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        assert!(SpriteBatchConfig::new().with_max_sprites(0).validate().is_err());
        assert!(SpriteBatchConfig::new().with_texture_slots(0).validate().is_err());
        assert!(SpriteBatchConfig::new().with_max_descriptor_sets(0).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_depth() {
        let config = SpriteBatchConfig::new().with_clear_depth_stencil(2.0, 0);
        assert!(matches!(config.validate(), Err(SpriteBatchError::InvalidConfig(_))));
    }
}
