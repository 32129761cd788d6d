//! Device abstraction and test utilities for Starfall.
//!
//! This crate provides the graphics device trait the sprite batch is written
//! against, the owned GPU handle wrappers it passes around, and a mock
//! context for testing without a GPU.
//!
//! # Overview
//!
//! - [`RenderContext`] - Trait abstracting GPU operations
//! - `MockRenderContext` - Mock implementation for testing (requires `mock` feature)
//! - GPU wrapper types (`GpuBuffer`, `GpuDescriptorSet`, etc.) - Can be real or mock
//! - [`CommandBuffer`] - Recorded render commands, replayed by the real context
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "mock")]
//! # {
//! use starfall_test_utils::{MockRenderContext, RenderContext};
//! use wgpu::*;
//!
//! let mock = MockRenderContext::new();
//!
//! let buffer = mock.create_buffer(&BufferDescriptor {
//!     label: Some("test_buffer"),
//!     size: 1024,
//!     usage: BufferUsages::VERTEX,
//!     mapped_at_creation: false,
//! }).unwrap();
//!
//! assert_eq!(mock.count_buffer_creates(), 1);
//! assert!(buffer.is_mock());
//! # }
//! ```
//!
//! # Design
//!
//! All GPU wrapper types are owned and reference counted internally, so no
//! lifetimes leak into the renderer. Mock implementations use `Mutex` for
//! interior mutability, allowing `&self` methods to record calls. The
//! `RenderContext` trait is object-safe (`dyn RenderContext`).

pub mod commands;
pub mod descriptors;
pub mod error;
pub mod gpu_types;
#[cfg(feature = "mock")]
pub mod mock_render;
pub mod render_context;

pub use commands::*;
pub use descriptors::*;
pub use error::DeviceError;
pub use gpu_types::*;
#[cfg(feature = "mock")]
pub use mock_render::*;
pub use render_context::*;
