//! Replay of recorded command buffers on the real device.

use starfall_core::profiling::{profile_function, profile_scope};
use starfall_test_utils::{
    AttachmentDescription, ClearValue, CommandBuffer, DeviceError, Framebuffer, LoadOp, RenderArea, RenderCommand, RenderPassInfo,
};

use crate::clear::{AspectFlags, ClearRenderPassInfo, format_aspects};
use crate::context::GraphicsContext;

/// Clear value of every attachment of `render_pass`, indexed by attachment.
///
/// `clear_values` holds one value per cleared attachment in declaration
/// order; attachments that load or discard get `None`.
pub fn attachment_clear_values(render_pass: &RenderPassInfo, clear_values: &[ClearValue]) -> Vec<Option<ClearValue>> {
    let mut values = vec![None; render_pass.attachments.len()];
    let cleared = ClearRenderPassInfo::new(render_pass);
    for (attachment, value) in cleared.attachments().iter().zip(clear_values) {
        values[attachment.index as usize] = Some(*value);
    }
    values
}

fn color_load(load_op: LoadOp, clear: Option<ClearValue>) -> wgpu::LoadOp<wgpu::Color> {
    match (load_op, clear) {
        (LoadOp::Clear, Some(ClearValue::Color([r, g, b, a]))) => wgpu::LoadOp::Clear(wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: a as f64,
        }),
        _ => wgpu::LoadOp::Load,
    }
}

fn depth_load(load_op: LoadOp, clear: Option<ClearValue>) -> wgpu::LoadOp<f32> {
    match (load_op, clear) {
        (LoadOp::Clear, Some(ClearValue::DepthStencil { depth, .. })) => wgpu::LoadOp::Clear(depth),
        _ => wgpu::LoadOp::Load,
    }
}

fn stencil_load(load_op: LoadOp, clear: Option<ClearValue>) -> wgpu::LoadOp<u32> {
    match (load_op, clear) {
        (LoadOp::Clear, Some(ClearValue::DepthStencil { stencil, .. })) => wgpu::LoadOp::Clear(stencil),
        _ => wgpu::LoadOp::Load,
    }
}

/// Render area clamped to the framebuffer, as a wgpu scissor rect.
fn scissor_rect(area: RenderArea, framebuffer: &Framebuffer) -> (u32, u32, u32, u32) {
    let x = (area.x.max(0) as u32).min(framebuffer.width);
    let y = (area.y.max(0) as u32).min(framebuffer.height);
    let width = area.width.min(framebuffer.width - x);
    let height = area.height.min(framebuffer.height - y);
    (x, y, width, height)
}

fn attachment_view(framebuffer: &Framebuffer, index: u32) -> Result<&wgpu::TextureView, DeviceError> {
    framebuffer
        .attachments
        .get(index as usize)
        .map(|view| view.as_wgpu())
        .ok_or_else(|| DeviceError::Validation(format!("framebuffer has no attachment {}", index)))
}

fn attachment_description(render_pass: &RenderPassInfo, index: u32) -> Result<AttachmentDescription, DeviceError> {
    render_pass
        .attachments
        .get(index as usize)
        .copied()
        .ok_or_else(|| DeviceError::Validation(format!("render pass has no attachment {}", index)))
}

impl GraphicsContext {
    /// Encode `commands` and submit them to the queue.
    pub fn submit(&self, commands: &CommandBuffer) -> Result<(), DeviceError> {
        profile_function!();

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: commands.label(),
        });

        let mut remaining = commands.commands();
        while let Some((first, rest)) = remaining.split_first() {
            let RenderCommand::BeginRenderPass {
                render_pass,
                framebuffer,
                render_area,
                clear_values,
            } = first
            else {
                return Err(DeviceError::Validation(format!(
                    "command {:?} recorded outside a render pass",
                    first
                )));
            };

            let end = rest
                .iter()
                .position(|command| matches!(command, RenderCommand::EndRenderPass))
                .ok_or_else(|| DeviceError::Validation("render pass is never ended".to_string()))?;

            self.encode_pass(
                &mut encoder,
                render_pass,
                framebuffer,
                *render_area,
                clear_values,
                &rest[..end],
            )?;
            remaining = &rest[end + 1..];
        }

        self.validated(|| self.queue.submit(std::iter::once(encoder.finish())))
            .map_err(|e| DeviceError::Validation(e.to_string()))?;
        Ok(())
    }

    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        render_pass: &RenderPassInfo,
        framebuffer: &Framebuffer,
        render_area: RenderArea,
        clear_values: &[ClearValue],
        commands: &[RenderCommand],
    ) -> Result<(), DeviceError> {
        profile_scope!("encode_sprite_pass");

        let clears = attachment_clear_values(render_pass, clear_values);
        let subpass = render_pass.subpasses.first().cloned().unwrap_or_default();
        if render_pass.subpasses.len() > 1 {
            tracing::warn!(
                "Render pass declares {} subpasses; only the first is replayed",
                render_pass.subpasses.len()
            );
        }

        let mut color_attachments = Vec::with_capacity(subpass.color_attachments.len());
        for &index in &subpass.color_attachments {
            let description = attachment_description(render_pass, index)?;
            color_attachments.push(Some(wgpu::RenderPassColorAttachment {
                view: attachment_view(framebuffer, index)?,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load(description.load_op, clears[index as usize]),
                    store: wgpu::StoreOp::Store,
                },
            }));
        }

        let depth_stencil_attachment = match subpass.depth_stencil_attachment {
            Some(index) => {
                let description = attachment_description(render_pass, index)?;
                let aspects = format_aspects(description.format);
                let clear = clears[index as usize];
                Some(wgpu::RenderPassDepthStencilAttachment {
                    view: attachment_view(framebuffer, index)?,
                    depth_ops: aspects.contains(AspectFlags::DEPTH).then(|| wgpu::Operations {
                        load: depth_load(description.load_op, clear),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: aspects.contains(AspectFlags::STENCIL).then(|| wgpu::Operations {
                        load: stencil_load(description.stencil_load_op, clear),
                        store: wgpu::StoreOp::Store,
                    }),
                })
            }
            None => None,
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("sprite_batch_pass"),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let (x, y, width, height) = scissor_rect(render_area, framebuffer);
        pass.set_scissor_rect(x, y, width, height);

        for command in commands {
            match command {
                RenderCommand::BindDescriptorSet { index, set, .. } => {
                    let bind_group = set.as_real().lock().bind_group.clone().ok_or_else(|| {
                        DeviceError::Validation("descriptor set was bound before it was written".to_string())
                    })?;
                    pass.set_bind_group(*index, &bind_group, &[]);
                }
                RenderCommand::BindPipeline(pipeline) => pass.set_pipeline(pipeline.as_wgpu()),
                RenderCommand::BindIndexBuffer { buffer, offset, format } => {
                    pass.set_index_buffer(buffer.as_wgpu().slice(*offset..), *format);
                }
                RenderCommand::BindVertexBuffers { first_binding, buffers } => {
                    for (slot, (buffer, offset)) in (*first_binding..).zip(buffers) {
                        pass.set_vertex_buffer(slot, buffer.as_wgpu().slice(*offset..));
                    }
                }
                RenderCommand::DrawIndexedIndirect {
                    buffer,
                    offset,
                    draw_count,
                    stride,
                } => {
                    for draw in 0..*draw_count as u64 {
                        pass.draw_indexed_indirect(buffer.as_wgpu(), offset + draw * *stride as u64);
                    }
                }
                RenderCommand::BeginRenderPass { .. } | RenderCommand::EndRenderPass => {
                    return Err(DeviceError::Validation("render passes cannot nest".to_string()));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use starfall_test_utils::SubpassDescription;

    fn color_depth_pass(color_load: LoadOp, depth_load: LoadOp) -> RenderPassInfo {
        RenderPassInfo {
            attachments: vec![
                AttachmentDescription::color(wgpu::TextureFormat::Bgra8Unorm, color_load),
                AttachmentDescription::depth_stencil(wgpu::TextureFormat::Depth32Float, depth_load, LoadOp::DontCare),
            ],
            subpasses: vec![SubpassDescription {
                color_attachments: vec![0],
                depth_stencil_attachment: Some(1),
            }],
        }
    }

    #[test]
    fn test_clear_values_follow_cleared_attachments() {
        let pass = color_depth_pass(LoadOp::Load, LoadOp::Clear);
        let depth = ClearValue::DepthStencil { depth: 1.0, stencil: 0 };
        let values = attachment_clear_values(&pass, &[depth]);
        assert_eq!(values, vec![None, Some(depth)]);
    }

    #[test]
    fn test_missing_attachment_is_an_error() {
        let mut pass = color_depth_pass(LoadOp::Clear, LoadOp::Clear);
        pass.subpasses[0].depth_stencil_attachment = Some(5);

        assert!(attachment_description(&pass, 1).is_ok());
        assert!(matches!(
            attachment_description(&pass, 5),
            Err(DeviceError::Validation(_))
        ));
    }

    #[test]
    fn test_load_ops_from_clear_values() {
        let color = ClearValue::Color([0.0, 0.5, 1.0, 1.0]);
        assert_eq!(
            color_load(LoadOp::Clear, Some(color)),
            wgpu::LoadOp::Clear(wgpu::Color {
                r: 0.0,
                g: 0.5,
                b: 1.0,
                a: 1.0
            })
        );
        assert_eq!(color_load(LoadOp::Load, Some(color)), wgpu::LoadOp::Load);
        assert_eq!(
            depth_load(LoadOp::Clear, Some(ClearValue::DepthStencil { depth: 1.0, stencil: 3 })),
            wgpu::LoadOp::Clear(1.0)
        );
        assert_eq!(
            stencil_load(LoadOp::Clear, Some(ClearValue::DepthStencil { depth: 1.0, stencil: 3 })),
            wgpu::LoadOp::Clear(3)
        );
    }
}
