use starfall_core::profiling::profile_function;
use starfall_test_utils::{
    ClearValue, CommandBuffer, Framebuffer, GpuBuffer, GpuDescriptorSet, GpuPipelineLayout, GpuRenderPipeline,
    RenderArea, RenderPassInfo,
};

use crate::batch_buffer::BatchBufferLayout;

/// Everything needed to record the sprite draw for one render target.
///
/// Handles are shared with the owning batch, so a page stays valid for as
/// long as that batch is alive and the recorded commands pick up whatever
/// the last `end` uploaded.
#[derive(Debug, Clone)]
pub struct SpriteRenderPage {
    pub(crate) pipeline: GpuRenderPipeline,
    pub(crate) pipeline_layout: GpuPipelineLayout,
    pub(crate) descriptor_set: GpuDescriptorSet,
    pub(crate) render_pass: RenderPassInfo,
    pub(crate) render_area: RenderArea,
    pub(crate) clear_values: Vec<ClearValue>,
    pub(crate) batch_buffer: GpuBuffer,
    pub(crate) batch_layout: BatchBufferLayout,
    pub(crate) index_format: wgpu::IndexFormat,
    pub(crate) indirect_buffer: GpuBuffer,
    pub(crate) indirect_offset: u64,
    pub(crate) indirect_stride: u32,
}

impl SpriteRenderPage {
    pub fn render_pass(&self) -> &RenderPassInfo {
        &self.render_pass
    }

    pub fn render_area(&self) -> RenderArea {
        self.render_area
    }

    /// Clear values in attachment declaration order.
    pub fn clear_values(&self) -> &[ClearValue] {
        &self.clear_values
    }

    pub fn descriptor_set(&self) -> &GpuDescriptorSet {
        &self.descriptor_set
    }

    /// Record the render pass drawing every sprite of the batch.
    pub fn compile(&self, commands: &mut CommandBuffer, framebuffer: &Framebuffer) {
        profile_function!();

        commands.begin_render_pass(&self.render_pass, framebuffer, self.render_area, &self.clear_values);
        commands.bind_descriptor_set(&self.pipeline_layout, 0, &self.descriptor_set);
        commands.bind_pipeline(&self.pipeline);
        commands.bind_index_buffer(&self.batch_buffer, self.batch_layout.indices.offset, self.index_format);
        commands.bind_vertex_buffers(
            0,
            &[
                (&self.batch_buffer, self.batch_layout.vertices.offset),
                (&self.batch_buffer, self.batch_layout.instances.offset),
            ],
        );
        commands.draw_indexed_indirect(&self.indirect_buffer, self.indirect_offset, 1, self.indirect_stride);
        commands.end_render_pass();
    }
}
