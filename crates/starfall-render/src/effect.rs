//! Sprite pipeline variants.
//!
//! A [`SpriteEffectConfiguration`] owns the descriptor set layout and the
//! pipeline layout shared by every variant it loads. Each
//! [`EffectVariantSeed`] describes one render pass the sprites are drawn in,
//! and yields one [`EffectVariant`].

use std::sync::Arc;

use starfall_core::profiling::{profile_function, profile_scope};
use starfall_test_utils::{
    DescriptorPoolKind, DescriptorPoolSize, DescriptorSetLayoutBinding, DescriptorSetLayoutDescriptor,
    DescriptorType, GpuBindGroupLayout, GpuPipelineLayout, GpuRenderPipeline, GpuShaderModule,
    GraphicsPipelineDescriptor, RenderContext, RenderPassInfo, ShaderStage,
};

use crate::descriptor::EffectDescriptorPool;
use crate::error::{CapacityResource, SpriteBatchError};
use crate::shader_content::{AssetId, ShaderContentStreamer};
use crate::sprite::{SpriteVertex, instance_layout};

pub const VERTEX_ENTRY_POINT: &str = "vertMain";
pub const FRAGMENT_ENTRY_POINT: &str = "fragMain";

/// Sampled texture array.
pub const TEXTURES_BINDING: u32 = 0;
/// Material storage buffer.
pub const MATERIALS_BINDING: u32 = 1;
/// Sampler array paired with [`TEXTURES_BINDING`].
pub const SAMPLERS_BINDING: u32 = 2;

/// Blend factors of the sprite pipeline when blending is enabled.
pub const SPRITE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Src,
        dst_factor: wgpu::BlendFactor::Zero,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::Zero,
        operation: wgpu::BlendOperation::Add,
    },
};

/// Input for one pipeline variant.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectVariantSeed {
    /// Filled in by [`SpriteEffectConfiguration::load`].
    pub vertex_shader: AssetId,
    /// Filled in by [`SpriteEffectConfiguration::load`].
    pub fragment_shader: AssetId,
    pub render_pass: RenderPassInfo,
    pub blend_enabled: bool,
}

impl EffectVariantSeed {
    pub fn new(render_pass: RenderPassInfo) -> Self {
        Self {
            vertex_shader: AssetId::SPRITE_VERTEX,
            fragment_shader: AssetId::SPRITE_FRAGMENT_BASE,
            render_pass,
            blend_enabled: false,
        }
    }

    pub fn with_blend(mut self, enabled: bool) -> Self {
        self.blend_enabled = enabled;
        self
    }
}

/// A compiled sprite pipeline and the render pass it targets.
pub struct EffectVariant {
    context: Arc<dyn RenderContext>,
    pipeline: GpuRenderPipeline,
    layout: GpuPipelineLayout,
    render_pass: RenderPassInfo,
    destroyed: bool,
}

impl EffectVariant {
    pub fn pipeline(&self) -> &GpuRenderPipeline {
        &self.pipeline
    }

    pub fn pipeline_layout(&self) -> &GpuPipelineLayout {
        &self.layout
    }

    pub fn render_pass(&self) -> &RenderPassInfo {
        &self.render_pass
    }

    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.context.destroy_render_pipeline(&self.pipeline);
        self.destroyed = true;
    }
}

impl Drop for EffectVariant {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for EffectVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectVariant")
            .field("pipeline", &self.pipeline)
            .field("render_pass", &self.render_pass)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

/// Largest texture slot count a sprite layout can declare on a device.
///
/// A single slot binds plain resources; more slots need binding arrays,
/// which count against both the per-stage and the binding-array limits.
pub fn max_texture_slots(limits: &wgpu::Limits) -> u32 {
    let arrays = limits
        .max_binding_array_elements_per_shader_stage
        .min(limits.max_binding_array_sampler_elements_per_shader_stage)
        .min(limits.max_sampled_textures_per_shader_stage)
        .min(limits.max_samplers_per_shader_stage);
    arrays.max(1)
}

/// Layouts and shader source shared by the sprite pipeline variants.
pub struct SpriteEffectConfiguration {
    context: Arc<dyn RenderContext>,
    content: Arc<dyn ShaderContentStreamer>,
    texture_slots: u32,
    bind_group_layout: GpuBindGroupLayout,
    pipeline_layout: GpuPipelineLayout,
    destroyed: bool,
}

impl SpriteEffectConfiguration {
    pub fn new(
        context: Arc<dyn RenderContext>,
        content: Arc<dyn ShaderContentStreamer>,
        texture_slots: u32,
    ) -> Result<Self, SpriteBatchError> {
        if texture_slots == 0 {
            return Err(SpriteBatchError::InvalidConfig(
                "texture_slots must be at least 1".to_string(),
            ));
        }
        let max_slots = max_texture_slots(&context.limits());
        if texture_slots > max_slots {
            tracing::error!(
                "{} texture slots exceed the device limit of {} per stage",
                texture_slots,
                max_slots
            );
            return Err(SpriteBatchError::CapacityExceeded {
                resource: CapacityResource::TextureSlots,
                limit: max_slots,
            });
        }

        let bindings = [
            DescriptorSetLayoutBinding {
                binding: TEXTURES_BINDING,
                ty: DescriptorType::CombinedImageSampler {
                    sampler_binding: SAMPLERS_BINDING,
                },
                count: texture_slots,
                visibility: wgpu::ShaderStages::FRAGMENT,
            },
            DescriptorSetLayoutBinding {
                binding: MATERIALS_BINDING,
                ty: DescriptorType::StorageBuffer,
                count: 1,
                visibility: wgpu::ShaderStages::VERTEX,
            },
        ];
        let bind_group_layout = context
            .create_bind_group_layout(&DescriptorSetLayoutDescriptor {
                label: Some("Sprite Bind Group Layout"),
                bindings: &bindings,
            })
            .inspect_err(|e| tracing::error!("Failed to create sprite bind group layout: {}", e))?;
        let pipeline_layout =
            match context.create_pipeline_layout(Some("Sprite Pipeline Layout"), &[&bind_group_layout]) {
                Ok(layout) => layout,
                Err(e) => {
                    tracing::error!("Failed to create sprite pipeline layout: {}", e);
                    context.destroy_bind_group_layout(&bind_group_layout);
                    return Err(e.into());
                }
            };

        Ok(Self {
            context,
            content,
            texture_slots,
            bind_group_layout,
            pipeline_layout,
            destroyed: false,
        })
    }

    pub fn texture_slots(&self) -> u32 {
        self.texture_slots
    }

    pub fn bind_group_layout(&self) -> &GpuBindGroupLayout {
        &self.bind_group_layout
    }

    pub fn pipeline_layout(&self) -> &GpuPipelineLayout {
        &self.pipeline_layout
    }

    /// Build one pipeline per seed.
    ///
    /// The shader ids of every seed are overwritten with the sprite vertex
    /// shader and the fragment shader for this slot count. Any failure
    /// releases what was already built and aborts the whole load.
    pub fn load(&self, seeds: &mut [EffectVariantSeed]) -> Result<Vec<EffectVariant>, SpriteBatchError> {
        profile_function!();

        if self.destroyed {
            return Err(SpriteBatchError::InvalidOperation("effect configuration was destroyed"));
        }

        let vertex_id = AssetId::SPRITE_VERTEX;
        let fragment_id = AssetId::sprite_fragment(self.texture_slots);
        for seed in seeds.iter_mut() {
            seed.vertex_shader = vertex_id;
            seed.fragment_shader = fragment_id;
        }

        let vertex_code = self.content.load(vertex_id)?;
        let fragment_code = self.content.load(fragment_id)?;

        let vertex = self
            .context
            .create_shader_module(Some("Sprite Vertex Shader"), &vertex_code)
            .inspect_err(|e| tracing::error!("Failed to create sprite vertex shader: {}", e))?;
        let fragment = match self
            .context
            .create_shader_module(Some("Sprite Fragment Shader"), &fragment_code)
        {
            Ok(module) => module,
            Err(e) => {
                tracing::error!("Failed to create sprite fragment shader: {}", e);
                self.context.destroy_shader_module(vertex);
                return Err(e.into());
            }
        };

        let mut variants = Vec::with_capacity(seeds.len());
        let mut result = Ok(());
        for seed in seeds.iter() {
            match self.create_variant(seed, &vertex, &fragment) {
                Ok(variant) => variants.push(variant),
                Err(e) => {
                    tracing::error!("Failed to create sprite pipeline: {}", e);
                    result = Err(e);
                    break;
                }
            }
        }

        self.context.destroy_shader_module(vertex);
        self.context.destroy_shader_module(fragment);

        // Variants built before a failure are released on drop.
        result?;
        tracing::info!(
            "Loaded {} sprite pipeline variant(s) for {} texture slots",
            variants.len(),
            self.texture_slots
        );
        Ok(variants)
    }

    fn create_variant(
        &self,
        seed: &EffectVariantSeed,
        vertex: &GpuShaderModule,
        fragment: &GpuShaderModule,
    ) -> Result<EffectVariant, SpriteBatchError> {
        profile_scope!("create_variant");

        let blend = seed.blend_enabled.then_some(SPRITE_BLEND);
        let color_targets: Vec<Option<wgpu::ColorTargetState>> = seed
            .render_pass
            .color_formats()
            .into_iter()
            .map(|format| {
                Some(wgpu::ColorTargetState {
                    format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let depth_stencil = seed
            .render_pass
            .depth_stencil_format()
            .map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            });

        let vertex_buffers = [SpriteVertex::layout(), instance_layout()];

        let pipeline = self.context.create_render_pipeline(&GraphicsPipelineDescriptor {
            label: Some("Sprite Pipeline"),
            layout: &self.pipeline_layout,
            vertex: ShaderStage {
                module: vertex,
                entry_point: VERTEX_ENTRY_POINT,
            },
            fragment: ShaderStage {
                module: fragment,
                entry_point: FRAGMENT_ENTRY_POINT,
            },
            vertex_buffers: &vertex_buffers,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            color_targets: &color_targets,
        })?;

        Ok(EffectVariant {
            context: self.context.clone(),
            pipeline,
            layout: self.pipeline_layout.clone(),
            render_pass: seed.render_pass.clone(),
            destroyed: false,
        })
    }

    /// Pool with room for `max_sets` sprite descriptor sets.
    pub fn create_descriptor_pool(&self, max_sets: u32) -> Result<EffectDescriptorPool, SpriteBatchError> {
        if self.destroyed {
            return Err(SpriteBatchError::InvalidOperation("effect configuration was destroyed"));
        }
        let pool_sizes = [
            DescriptorPoolSize {
                kind: DescriptorPoolKind::CombinedImageSampler,
                count: max_sets * self.texture_slots,
            },
            DescriptorPoolSize {
                kind: DescriptorPoolKind::StorageBuffer,
                count: max_sets,
            },
        ];
        Ok(EffectDescriptorPool::new(
            self.context.clone(),
            self.bind_group_layout.clone(),
            max_sets,
            &pool_sizes,
        ))
    }

    /// Release the layouts. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.context.destroy_pipeline_layout(&self.pipeline_layout);
        self.context.destroy_bind_group_layout(&self.bind_group_layout);
        tracing::debug!("Destroyed sprite effect configuration");
        self.destroyed = true;
    }
}

impl Drop for SpriteEffectConfiguration {
    fn drop(&mut self) {
        self.destroy();
    }
}
