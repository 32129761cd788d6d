//! Clear values derived from a render pass description.
//!
//! Every attachment that is cleared on load needs exactly one clear value,
//! and the values must follow attachment declaration order. The shape of each
//! value (colour or depth/stencil) follows from the aspects the attachment
//! exposes, which come from its format and from how subpasses reference it.

use starfall_test_utils::{ClearValue, LoadOp, RenderPassInfo};

use crate::color::Color;
use crate::error::SpriteBatchError;

bitflags::bitflags! {
    /// Image aspects of an attachment.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AspectFlags: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Aspects present in a texture format.
pub fn format_aspects(format: wgpu::TextureFormat) -> AspectFlags {
    use wgpu::TextureFormat as F;
    match format {
        F::Stencil8 => AspectFlags::STENCIL,
        F::Depth16Unorm | F::Depth24Plus | F::Depth32Float => AspectFlags::DEPTH,
        F::Depth24PlusStencil8 | F::Depth32FloatStencil8 => AspectFlags::DEPTH | AspectFlags::STENCIL,
        _ => AspectFlags::COLOR,
    }
}

/// A cleared attachment and the aspects it was found to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearAttachmentInfo {
    /// Position in the render pass attachment list.
    pub index: u32,
    pub format: wgpu::TextureFormat,
    pub aspects: AspectFlags,
    /// First subpass referencing the attachment, if any does.
    pub first_subpass: Option<u32>,
}

impl ClearAttachmentInfo {
    /// Clear value of the shape the aspects call for.
    pub fn clear_value(&self, color: Color, depth: f32, stencil: u32) -> Result<ClearValue, SpriteBatchError> {
        let depth_stencil = AspectFlags::DEPTH | AspectFlags::STENCIL;
        if self.aspects == AspectFlags::COLOR {
            Ok(ClearValue::Color(color.to_array()))
        } else if !self.aspects.is_empty() && depth_stencil.contains(self.aspects) {
            Ok(ClearValue::DepthStencil { depth, stencil })
        } else {
            Err(SpriteBatchError::UnsupportedAttachment {
                attachment: self.index,
                aspects: self.aspects,
            })
        }
    }
}

/// Cleared attachments of a render pass, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearRenderPassInfo {
    attachments: Vec<ClearAttachmentInfo>,
}

impl ClearRenderPassInfo {
    pub fn new(info: &RenderPassInfo) -> Self {
        let mut attachments: Vec<ClearAttachmentInfo> = info
            .attachments
            .iter()
            .enumerate()
            .filter(|(_, a)| a.load_op == LoadOp::Clear || a.stencil_load_op == LoadOp::Clear)
            .map(|(index, a)| {
                let format_aspects = format_aspects(a.format);
                let mut aspects = AspectFlags::empty();
                if a.load_op == LoadOp::Clear {
                    aspects |= format_aspects & (AspectFlags::COLOR | AspectFlags::DEPTH);
                }
                if a.stencil_load_op == LoadOp::Clear {
                    aspects |= format_aspects & AspectFlags::STENCIL;
                }
                ClearAttachmentInfo {
                    index: index as u32,
                    format: a.format,
                    aspects,
                    first_subpass: None,
                }
            })
            .collect();

        for (subpass_index, subpass) in info.subpasses.iter().enumerate() {
            let subpass_index = subpass_index as u32;

            for &reference in &subpass.color_attachments {
                if let Some(attachment) = attachments.iter_mut().find(|a| a.index == reference) {
                    attachment.aspects |= AspectFlags::COLOR;
                    attachment.first_subpass.get_or_insert(subpass_index);
                }
            }

            if let Some(reference) = subpass.depth_stencil_attachment {
                if let Some(attachment) = attachments.iter_mut().find(|a| a.index == reference) {
                    attachment.aspects |=
                        format_aspects(attachment.format) & (AspectFlags::DEPTH | AspectFlags::STENCIL);
                    attachment.first_subpass.get_or_insert(subpass_index);
                }
            }
        }

        Self { attachments }
    }

    pub fn attachments(&self) -> &[ClearAttachmentInfo] {
        &self.attachments
    }

    /// One clear value per cleared attachment, in declaration order.
    pub fn clear_values(&self, color: Color, depth: f32, stencil: u32) -> Result<Vec<ClearValue>, SpriteBatchError> {
        self.attachments
            .iter()
            .map(|attachment| attachment.clear_value(color, depth, stencil))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use starfall_test_utils::{AttachmentDescription, SubpassDescription};
    use wgpu::TextureFormat;

    fn color_depth_pass() -> RenderPassInfo {
        RenderPassInfo {
            attachments: vec![
                AttachmentDescription::color(TextureFormat::Bgra8UnormSrgb, LoadOp::Clear),
                AttachmentDescription::depth_stencil(
                    TextureFormat::Depth24PlusStencil8,
                    LoadOp::Clear,
                    LoadOp::Clear,
                ),
            ],
            subpasses: vec![SubpassDescription {
                color_attachments: vec![0],
                depth_stencil_attachment: Some(1),
            }],
        }
    }

    #[test]
    fn test_format_aspects() {
        assert_eq!(format_aspects(TextureFormat::Stencil8), AspectFlags::STENCIL);
        assert_eq!(format_aspects(TextureFormat::Depth32Float), AspectFlags::DEPTH);
        assert_eq!(
            format_aspects(TextureFormat::Depth32FloatStencil8),
            AspectFlags::DEPTH | AspectFlags::STENCIL
        );
        assert_eq!(format_aspects(TextureFormat::Rgba8Unorm), AspectFlags::COLOR);
    }

    #[test]
    fn test_color_and_depth_stencil() {
        let info = ClearRenderPassInfo::new(&color_depth_pass());
        let values = info.clear_values(Color::BLACK, 1.0, 0).unwrap();

        assert_eq!(
            values,
            vec![
                ClearValue::Color([0.0, 0.0, 0.0, 1.0]),
                ClearValue::DepthStencil {
                    depth: 1.0,
                    stencil: 0
                },
            ]
        );
        assert_eq!(info.attachments()[1].first_subpass, Some(0));
    }

    #[test]
    fn test_order_follows_declaration_not_subpasses() {
        let pass = RenderPassInfo {
            attachments: vec![
                AttachmentDescription::depth_stencil(TextureFormat::Depth32Float, LoadOp::Clear, LoadOp::DontCare),
                AttachmentDescription::color(TextureFormat::Rgba8Unorm, LoadOp::Clear),
            ],
            subpasses: vec![
                SubpassDescription {
                    color_attachments: vec![1],
                    depth_stencil_attachment: None,
                },
                SubpassDescription {
                    color_attachments: vec![],
                    depth_stencil_attachment: Some(0),
                },
            ],
        };
        let info = ClearRenderPassInfo::new(&pass);
        let values = info.clear_values(Color::WHITE, 0.5, 7).unwrap();

        assert!(matches!(values[0], ClearValue::DepthStencil { depth, stencil: 7 } if depth == 0.5));
        assert!(matches!(values[1], ClearValue::Color(_)));
        assert_eq!(info.attachments()[0].first_subpass, Some(1));
        assert_eq!(info.attachments()[1].first_subpass, Some(0));
    }

    #[test]
    fn test_loaded_attachments_are_skipped() {
        let pass = RenderPassInfo {
            attachments: vec![
                AttachmentDescription::color(TextureFormat::Rgba8Unorm, LoadOp::Load),
                AttachmentDescription::depth_stencil(TextureFormat::Stencil8, LoadOp::DontCare, LoadOp::Clear),
            ],
            subpasses: vec![],
        };
        let info = ClearRenderPassInfo::new(&pass);
        let values = info.clear_values(Color::WHITE, 1.0, 3).unwrap();

        assert_eq!(values.len(), 1);
        assert_eq!(info.attachments()[0].index, 1);
        assert_eq!(info.attachments()[0].aspects, AspectFlags::STENCIL);
        assert_eq!(info.attachments()[0].first_subpass, None);
    }

    #[test]
    fn test_depth_attachment_used_as_color_is_rejected() {
        let pass = RenderPassInfo {
            attachments: vec![AttachmentDescription::depth_stencil(
                TextureFormat::Depth32Float,
                LoadOp::Clear,
                LoadOp::DontCare,
            )],
            subpasses: vec![SubpassDescription {
                color_attachments: vec![0],
                depth_stencil_attachment: None,
            }],
        };
        let result = ClearRenderPassInfo::new(&pass).clear_values(Color::WHITE, 1.0, 0);
        assert!(matches!(
            result,
            Err(SpriteBatchError::UnsupportedAttachment { attachment: 0, .. })
        ));
    }

    #[test]
    fn test_empty_aspects_are_rejected() {
        // A colour format has no stencil to clear.
        let pass = RenderPassInfo {
            attachments: vec![AttachmentDescription {
                format: TextureFormat::Rgba8Unorm,
                load_op: LoadOp::Load,
                stencil_load_op: LoadOp::Clear,
            }],
            subpasses: vec![],
        };
        assert!(ClearRenderPassInfo::new(&pass).clear_values(Color::WHITE, 1.0, 0).is_err());
    }
}
