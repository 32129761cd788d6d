use std::sync::Arc;

use starfall_core::profiling::profile_function;
use starfall_test_utils::RenderContext;

use crate::config::SpriteBatchConfig;
use crate::descriptor::EffectDescriptorPool;
use crate::effect::{EffectVariant, EffectVariantSeed, SpriteEffectConfiguration};
use crate::error::SpriteBatchError;
use crate::frame::FrameInfo;
use crate::shader_content::ShaderContentStreamer;

use super::batch::SpriteBatch;

/// The sprite pipeline together with a batch bound to it.
///
/// Owns every GPU object the sprite path needs. Dropping it, or calling
/// [`SpriteBatchEffect::destroy`], releases them in reverse order of
/// creation.
pub struct SpriteBatchEffect {
    batch: SpriteBatch,
    variants: Vec<EffectVariant>,
    pool: EffectDescriptorPool,
    configuration: SpriteEffectConfiguration,
    destroyed: bool,
}

impl SpriteBatchEffect {
    /// Load the pipeline for `frame`'s render pass and bind a fresh batch to
    /// it.
    pub fn initialise(
        context: Arc<dyn RenderContext>,
        content: Arc<dyn ShaderContentStreamer>,
        config: &SpriteBatchConfig,
        frame: &FrameInfo,
    ) -> Result<Self, SpriteBatchError> {
        profile_function!();
        config.validate()?;

        let configuration = SpriteEffectConfiguration::new(context.clone(), content, config.texture_slots)?;
        let pool = configuration.create_descriptor_pool(config.max_descriptor_sets)?;
        let descriptor_set = pool.create_descriptor_set()?;

        let mut seeds = [EffectVariantSeed::new(frame.render_pass.clone()).with_blend(config.blend_enabled)];
        let variants = configuration.load(&mut seeds)?;

        let mut batch = SpriteBatch::new(context, config)?;
        batch.bind(&variants[0], descriptor_set, frame)?;

        tracing::info!(
            "Initialised sprite batch effect: {} sprites, {} texture slots",
            config.max_sprites,
            config.texture_slots
        );

        Ok(Self {
            batch,
            variants,
            pool,
            configuration,
            destroyed: false,
        })
    }

    pub fn batch(&self) -> &SpriteBatch {
        &self.batch
    }

    pub fn batch_mut(&mut self) -> &mut SpriteBatch {
        &mut self.batch
    }

    pub fn variants(&self) -> &[EffectVariant] {
        &self.variants
    }

    pub fn descriptor_pool(&self) -> &EffectDescriptorPool {
        &self.pool
    }

    pub fn configuration(&self) -> &SpriteEffectConfiguration {
        &self.configuration
    }

    /// Release everything. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.batch.destroy();
        for variant in &mut self.variants {
            variant.destroy();
        }
        self.pool.destroy();
        self.configuration.destroy();
        self.destroyed = true;
        tracing::debug!("Destroyed sprite batch effect");
    }
}

impl Drop for SpriteBatchEffect {
    fn drop(&mut self) {
        self.destroy();
    }
}
