//! Starfall Render - Sprite batching on wgpu
//!
//! This crate draws textured, coloured and rotated sprites in batches:
//! - One indexed indirect draw per batch, with per-sprite materials in a storage buffer
//! - A texture array bound per batch, one slot per `draw` or shared through `draw_slot`
//! - Render pages that record the draw once per framebuffer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use starfall_render::*;
//! use starfall_test_utils::{AttachmentDescription, LoadOp, RenderPassInfo, SubpassDescription};
//!
//! let context = GraphicsContext::new_owned_sync().expect("no suitable GPU");
//! let render_pass = RenderPassInfo {
//!     attachments: vec![AttachmentDescription::color(wgpu::TextureFormat::Bgra8Unorm, LoadOp::Clear)],
//!     subpasses: vec![SubpassDescription { color_attachments: vec![0], depth_stencil_attachment: None }],
//! };
//! let frame = FrameInfo::new(1280, 720, render_pass);
//!
//! let mut effect = SpriteBatchEffect::initialise(
//!     context.clone(),
//!     Arc::new(EmbeddedShaderContent),
//!     &SpriteBatchConfig::default(),
//!     &frame,
//! )?;
//!
//! # let texture: SpriteTexture = unimplemented!();
//! let batch = effect.batch_mut();
//! batch.begin()?;
//! batch.draw(&texture, SpriteDraw::at(glam::Vec2::new(10.0, 20.0)).color(Color::WHITE))?;
//! batch.end()?;
//! # Ok::<(), SpriteBatchError>(())
//! ```
//!
//! ## Testing
//!
//! Everything above the device is written against
//! [`RenderContext`](starfall_test_utils::RenderContext), so it runs
//! unchanged on `MockRenderContext` from `starfall-test-utils`.

pub mod batch_buffer;
pub mod clear;
mod color;
pub mod config;
mod context;
mod context_impl;
pub mod descriptor;
pub mod effect;
mod error;
mod frame;
pub mod indirect;
pub mod shader_content;
pub mod sprite;
pub mod submit;

pub use batch_buffer::{BatchBuffer, BatchBufferDescriptor, BatchBufferLayout};
pub use clear::{AspectFlags, ClearRenderPassInfo};
pub use color::Color;
pub use config::SpriteBatchConfig;
pub use context::{GraphicsContext, GraphicsContextDescriptor, GraphicsError, SPRITE_FEATURES};
pub use descriptor::{EffectDescriptorPool, EffectDescriptorSet};
pub use effect::{EffectVariant, EffectVariantSeed, SpriteEffectConfiguration};
pub use error::{CapacityResource, SpriteBatchError};
pub use frame::FrameInfo;
pub use indirect::IndirectCommandBuffer;
pub use shader_content::{
    AssetId, DirectoryShaderContent, EmbeddedShaderContent, ShaderContentError, ShaderContentMap,
    ShaderContentStreamer,
};
pub use sprite::*;
