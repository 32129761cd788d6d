//! Recorded command buffers.
//!
//! Commands are recorded once per framebuffer and replayed every frame. The
//! real context turns them into a wgpu render pass; tests inspect them
//! directly.

use crate::descriptors::{ClearValue, Framebuffer, RenderArea, RenderPassInfo};
use crate::gpu_types::*;

#[derive(Debug, Clone)]
pub enum RenderCommand {
    BeginRenderPass {
        render_pass: RenderPassInfo,
        framebuffer: Framebuffer,
        render_area: RenderArea,
        clear_values: Vec<ClearValue>,
    },
    BindDescriptorSet {
        layout: GpuPipelineLayout,
        index: u32,
        set: GpuDescriptorSet,
    },
    BindPipeline(GpuRenderPipeline),
    BindIndexBuffer {
        buffer: GpuBuffer,
        offset: u64,
        format: wgpu::IndexFormat,
    },
    BindVertexBuffers {
        first_binding: u32,
        buffers: Vec<(GpuBuffer, u64)>,
    },
    DrawIndexedIndirect {
        buffer: GpuBuffer,
        offset: u64,
        draw_count: u32,
        stride: u32,
    },
    EndRenderPass,
}

/// Ordered list of [`RenderCommand`]s.
#[derive(Debug, Clone, Default)]
pub struct CommandBuffer {
    label: Option<String>,
    commands: Vec<RenderCommand>,
}

impl CommandBuffer {
    pub fn new(label: Option<&str>) -> Self {
        Self {
            label: label.map(str::to_string),
            commands: Vec::new(),
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drop every recorded command so the buffer can be recorded again.
    pub fn reset(&mut self) {
        self.commands.clear();
    }

    pub fn begin_render_pass(
        &mut self,
        render_pass: &RenderPassInfo,
        framebuffer: &Framebuffer,
        render_area: RenderArea,
        clear_values: &[ClearValue],
    ) {
        self.commands.push(RenderCommand::BeginRenderPass {
            render_pass: render_pass.clone(),
            framebuffer: framebuffer.clone(),
            render_area,
            clear_values: clear_values.to_vec(),
        });
    }

    pub fn bind_descriptor_set(&mut self, layout: &GpuPipelineLayout, index: u32, set: &GpuDescriptorSet) {
        self.commands.push(RenderCommand::BindDescriptorSet {
            layout: layout.clone(),
            index,
            set: set.clone(),
        });
    }

    pub fn bind_pipeline(&mut self, pipeline: &GpuRenderPipeline) {
        self.commands.push(RenderCommand::BindPipeline(pipeline.clone()));
    }

    pub fn bind_index_buffer(&mut self, buffer: &GpuBuffer, offset: u64, format: wgpu::IndexFormat) {
        self.commands.push(RenderCommand::BindIndexBuffer {
            buffer: buffer.clone(),
            offset,
            format,
        });
    }

    pub fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[(&GpuBuffer, u64)]) {
        self.commands.push(RenderCommand::BindVertexBuffers {
            first_binding,
            buffers: buffers
                .iter()
                .map(|(buffer, offset)| ((*buffer).clone(), *offset))
                .collect(),
        });
    }

    pub fn draw_indexed_indirect(&mut self, buffer: &GpuBuffer, offset: u64, draw_count: u32, stride: u32) {
        self.commands.push(RenderCommand::DrawIndexedIndirect {
            buffer: buffer.clone(),
            offset,
            draw_count,
            stride,
        });
    }

    pub fn end_render_pass(&mut self) {
        self.commands.push(RenderCommand::EndRenderPass);
    }
}
