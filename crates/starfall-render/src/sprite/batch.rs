use std::sync::Arc;

use starfall_core::profiling::profile_function;
use starfall_test_utils::{CommandBuffer, Framebuffer, RenderContext};

use crate::batch_buffer::{BatchBuffer, BatchBufferDescriptor};
use crate::clear::ClearRenderPassInfo;
use crate::config::SpriteBatchConfig;
use crate::descriptor::EffectDescriptorSet;
use crate::effect::{EffectVariant, MATERIALS_BINDING, TEXTURES_BINDING};
use crate::error::SpriteBatchError;
use crate::frame::FrameInfo;
use crate::indirect::{IndirectCommandBuffer, serializer_for_backend};

use super::page::SpriteRenderPage;
use super::renderer::SpriteBatchRenderer;
use super::types::{SpriteDraw, SpriteTexture};

/// Statistics from the last `end`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpriteBatchStats {
    /// Sprites drawn.
    pub sprite_count: u32,
    /// Texture slots used.
    pub texture_count: u32,
    /// Descriptor writes committed.
    pub descriptor_writes: u32,
    /// Bytes pushed to the batch buffer.
    pub bytes_uploaded: u64,
}

/// A sprite batch bound to one render target.
///
/// ```text
/// begin -> draw* -> end -> (compile once per framebuffer) -> submit
/// ```
///
/// Until [`SpriteBatch::bind`] is called the batch accumulates sprites but
/// `end` uploads nothing and `compile` fails.
pub struct SpriteBatch {
    config: SpriteBatchConfig,
    renderer: SpriteBatchRenderer,
    batch_buffer: BatchBuffer,
    indirect: IndirectCommandBuffer,
    descriptor_set: Option<EffectDescriptorSet>,
    page: Option<SpriteRenderPage>,
    stats: SpriteBatchStats,
    destroyed: bool,
}

impl SpriteBatch {
    /// Allocate the batch and indirect buffers for `config`.
    pub fn new(context: Arc<dyn RenderContext>, config: &SpriteBatchConfig) -> Result<Self, SpriteBatchError> {
        let serializer = serializer_for_backend(context.backend());
        let indirect = IndirectCommandBuffer::new(context.clone(), serializer)?;
        Self::with_indirect_buffer(context, config, indirect)
    }

    /// Like [`SpriteBatch::new`] but drawing from a caller-provided indirect
    /// buffer.
    pub fn with_indirect_buffer(
        context: Arc<dyn RenderContext>,
        config: &SpriteBatchConfig,
        indirect: IndirectCommandBuffer,
    ) -> Result<Self, SpriteBatchError> {
        config.validate()?;

        let desc = BatchBufferDescriptor::for_sprites(config.max_sprites, config.index_format)?;
        let batch_buffer = BatchBuffer::new(context, &desc)?;

        Ok(Self {
            config: config.clone(),
            renderer: SpriteBatchRenderer::new(config.max_sprites, config.texture_slots),
            batch_buffer,
            indirect,
            descriptor_set: None,
            page: None,
            stats: SpriteBatchStats::default(),
            destroyed: false,
        })
    }

    /// Attach the pipeline and descriptor set to draw with, and the frame to
    /// draw into.
    pub fn bind(
        &mut self,
        variant: &EffectVariant,
        descriptor_set: EffectDescriptorSet,
        frame: &FrameInfo,
    ) -> Result<(), SpriteBatchError> {
        if self.renderer.is_accumulating() {
            return Err(SpriteBatchError::InvalidOperation("cannot bind while a batch is open"));
        }

        let clear_values = ClearRenderPassInfo::new(variant.render_pass()).clear_values(
            self.config.clear_color,
            self.config.clear_depth,
            self.config.clear_stencil,
        )?;

        self.renderer.set_viewport(&frame.viewport);
        self.page = Some(SpriteRenderPage {
            pipeline: variant.pipeline().clone(),
            pipeline_layout: variant.pipeline_layout().clone(),
            descriptor_set: descriptor_set.set().clone(),
            render_pass: variant.render_pass().clone(),
            render_area: frame.scissor,
            clear_values,
            batch_buffer: self.batch_buffer.buffer().clone(),
            batch_layout: *self.batch_buffer.layout(),
            index_format: self.batch_buffer.index_format(),
            indirect_buffer: self.indirect.buffer().clone(),
            indirect_offset: self.indirect.offset(),
            indirect_stride: self.indirect.stride(),
        });
        self.descriptor_set = Some(descriptor_set);
        Ok(())
    }

    /// Detach the render page, handing the descriptor set back.
    pub fn unbind(&mut self) -> Option<EffectDescriptorSet> {
        self.page = None;
        self.descriptor_set.take()
    }

    pub fn page(&self) -> Option<&SpriteRenderPage> {
        self.page.as_ref()
    }

    pub fn begin(&mut self) -> Result<(), SpriteBatchError> {
        profile_function!();
        self.ensure_alive()?;
        if self.renderer.is_accumulating() {
            return Err(SpriteBatchError::InvalidOperation("begin called twice without end"));
        }

        if let Some(set) = &mut self.descriptor_set {
            set.begin()?;
            if let Err(e) = set.set_storage_buffers(MATERIALS_BINDING, 0, &[self.batch_buffer.materials_binding()]) {
                set.abort();
                return Err(e);
            }
        }
        self.renderer.begin()
    }

    /// Draw `texture` in the next free texture slot.
    pub fn draw(&mut self, texture: &SpriteTexture, draw: SpriteDraw) -> Result<u32, SpriteBatchError> {
        self.renderer.draw(texture, draw)
    }

    /// Draw with the texture already in `slot` of this batch.
    pub fn draw_slot(&mut self, slot: u32, draw: SpriteDraw) -> Result<(), SpriteBatchError> {
        self.renderer.draw_slot(slot, draw)
    }

    /// Close the batch and upload it.
    ///
    /// Without a bound descriptor set this only closes the batch.
    pub fn end(&mut self) -> Result<(), SpriteBatchError> {
        profile_function!();
        self.renderer.end()?;

        let Some(set) = &mut self.descriptor_set else {
            return Ok(());
        };

        if let Err(e) = set.set_textures(TEXTURES_BINDING, 0, self.renderer.textures()) {
            set.abort();
            return Err(e);
        }
        let descriptor_writes = set.end()?;

        let bytes_uploaded = self.renderer.write_to(&mut self.batch_buffer)?;
        self.indirect.update(self.renderer.command())?;

        self.stats = SpriteBatchStats {
            sprite_count: self.renderer.sprite_count(),
            texture_count: self.renderer.textures().len() as u32,
            descriptor_writes: descriptor_writes as u32,
            bytes_uploaded,
        };
        tracing::debug!(
            "Sprite batch flushed: {} sprites, {} textures, {} bytes",
            self.stats.sprite_count,
            self.stats.texture_count,
            self.stats.bytes_uploaded
        );
        Ok(())
    }

    /// Record the draw of this batch into `commands`.
    pub fn compile(&self, commands: &mut CommandBuffer, framebuffer: &Framebuffer) -> Result<(), SpriteBatchError> {
        let page = self.page.as_ref().ok_or(SpriteBatchError::MissingRenderPage)?;
        page.compile(commands, framebuffer);
        Ok(())
    }

    pub fn stats(&self) -> SpriteBatchStats {
        self.stats
    }

    pub fn renderer(&self) -> &SpriteBatchRenderer {
        &self.renderer
    }

    pub fn batch_buffer(&self) -> &BatchBuffer {
        &self.batch_buffer
    }

    pub fn indirect_buffer(&self) -> &IndirectCommandBuffer {
        &self.indirect
    }

    pub fn config(&self) -> &SpriteBatchConfig {
        &self.config
    }

    /// Release the GPU buffers. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.page = None;
        self.descriptor_set = None;
        self.indirect.destroy();
        self.batch_buffer.destroy();
        self.destroyed = true;
    }

    fn ensure_alive(&self) -> Result<(), SpriteBatchError> {
        if self.destroyed {
            Err(SpriteBatchError::InvalidOperation("sprite batch was destroyed"))
        } else {
            Ok(())
        }
    }
}

impl Drop for SpriteBatch {
    fn drop(&mut self) {
        self.destroy();
    }
}
