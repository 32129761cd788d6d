//! Trait abstracting GPU operations.
//!
//! The `RenderContext` trait provides an abstraction over the graphics
//! device, allowing for both real GPU usage and mock implementations for
//! testing.

use crate::descriptors::*;
use crate::error::DeviceError;
use crate::gpu_types::*;
use wgpu::{BufferDescriptor, SamplerDescriptor, TextureDescriptor};

/// Trait abstracting GPU resource creation and operations.
///
/// # Lifetime Considerations
///
/// All returned types are owned and reference counted, so the trait has no
/// lifetimes and is object-safe (`dyn RenderContext`).
///
/// # Destruction
///
/// Resources are released either when the last handle is dropped or
/// explicitly through the `destroy_*` methods. Explicit destruction is what
/// the sprite batch uses; the mock records it so tests can check it happens
/// exactly once.
///
/// # Example
///
/// ```rust,no_run
/// use starfall_test_utils::RenderContext;
/// use wgpu::{BufferDescriptor, BufferUsages};
///
/// fn upload(ctx: &dyn RenderContext) -> Result<(), starfall_test_utils::DeviceError> {
///     let buffer = ctx.create_buffer(&BufferDescriptor {
///         label: None,
///         size: 16,
///         usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
///         mapped_at_creation: false,
///     })?;
///     ctx.write_buffer(&buffer, 0, &[0u8; 16]);
///     ctx.destroy_buffer(&buffer);
///     Ok(())
/// }
/// ```
pub trait RenderContext: Send + Sync {
    /// Backend the device runs on. Decides the indirect command layout.
    fn backend(&self) -> wgpu::Backend;

    fn limits(&self) -> wgpu::Limits;

    // Buffer operations

    fn create_buffer(&self, desc: &BufferDescriptor) -> Result<GpuBuffer, DeviceError>;

    /// Write data to a buffer.
    ///
    /// For real buffers, this maps to `queue.write_buffer()`, which is
    /// visible to the next submission without an explicit flush.
    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]);

    fn destroy_buffer(&self, buffer: &GpuBuffer);

    // Texture operations

    fn create_texture(&self, desc: &TextureDescriptor) -> GpuTexture;

    fn create_texture_view(&self, texture: &GpuTexture) -> GpuTextureView;

    fn create_sampler(&self, desc: &SamplerDescriptor) -> GpuSampler;

    // Shader operations

    /// Create a shader module from bytecode or source text.
    fn create_shader_module(&self, label: Option<&str>, code: &[u8]) -> Result<GpuShaderModule, DeviceError>;

    fn destroy_shader_module(&self, module: GpuShaderModule);

    // Layout and pipeline operations

    fn create_bind_group_layout(&self, desc: &DescriptorSetLayoutDescriptor) -> Result<GpuBindGroupLayout, DeviceError>;

    fn destroy_bind_group_layout(&self, layout: &GpuBindGroupLayout);

    fn create_pipeline_layout(
        &self,
        label: Option<&str>,
        layouts: &[&GpuBindGroupLayout],
    ) -> Result<GpuPipelineLayout, DeviceError>;

    fn destroy_pipeline_layout(&self, layout: &GpuPipelineLayout);

    fn create_render_pipeline(&self, desc: &GraphicsPipelineDescriptor) -> Result<GpuRenderPipeline, DeviceError>;

    fn destroy_render_pipeline(&self, pipeline: &GpuRenderPipeline);

    // Descriptor operations

    fn create_descriptor_pool(&self, desc: &DescriptorPoolDescriptor) -> GpuDescriptorPool;

    fn allocate_descriptor_set(
        &self,
        pool: &GpuDescriptorPool,
        layout: &GpuBindGroupLayout,
    ) -> Result<GpuDescriptorSet, DeviceError>;

    /// Apply a batch of descriptor writes in one device call.
    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) -> Result<(), DeviceError>;

    fn destroy_descriptor_pool(&self, pool: &GpuDescriptorPool);
}
