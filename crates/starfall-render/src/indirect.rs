//! Indexed indirect draw commands.
//!
//! The sprite batch issues exactly one indexed indirect draw per render page.
//! The command is kept in a small GPU buffer and rewritten at the end of every
//! batch, so the compiled command buffer never has to be re-recorded when the
//! number of sprites changes.
//!
//! Backends disagree on the signedness of the vertex offset field, so the
//! byte layout goes through an [`IndexedIndirectCommandSerializer`] chosen
//! once at startup with [`serializer_for_backend`].

use std::fmt::Debug;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use starfall_core::profiling::profile_function;
use starfall_test_utils::{GpuBuffer, RenderContext};

use crate::error::SpriteBatchError;

/// Backend independent indexed indirect draw command.
///
/// # Fields
///
/// * `index_count` - Number of indices to draw
/// * `instance_count` - Number of instances to draw
/// * `first_index` - Index of the first index to draw
/// * `vertex_offset` - Value added to each index before indexing into the vertex buffer
/// * `first_instance` - Instance ID of the first instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DrawIndexedIndirectCommand {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub first_instance: u32,
}

impl DrawIndexedIndirectCommand {
    /// Clear the counts accumulated for the previous batch.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Native layout with a signed vertex offset (Vulkan, D3D12, WebGPU).
///
/// This matches the layout expected by `wgpu::RenderPass::draw_indexed_indirect`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DrawIndexedIndirect {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

// SAFETY: DrawIndexedIndirect is a repr(C) struct of 4-byte fields with no padding
unsafe impl Pod for DrawIndexedIndirect {}
unsafe impl Zeroable for DrawIndexedIndirect {}

/// Layout with an unsigned vertex offset (Metal, GL).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DrawIndexedIndirectUnsigned {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: u32,
    pub first_instance: u32,
}

// SAFETY: DrawIndexedIndirectUnsigned is a repr(C) struct of u32s with no padding
unsafe impl Pod for DrawIndexedIndirectUnsigned {}
unsafe impl Zeroable for DrawIndexedIndirectUnsigned {}

static_assertions::const_assert_eq!(std::mem::size_of::<DrawIndexedIndirect>(), 20);
static_assertions::const_assert_eq!(std::mem::size_of::<DrawIndexedIndirectUnsigned>(), 20);

/// Writes logical commands in a backend's native byte layout.
pub trait IndexedIndirectCommandSerializer: Debug + Send + Sync {
    /// Size of one serialized command in bytes.
    fn stride(&self) -> u32;

    /// Write `commands` into `dest`, command `i` at `offset + i * stride`.
    ///
    /// # Panics
    ///
    /// Panics if the commands do not fit in `dest`.
    fn serialize(&self, dest: &mut [u8], offset: usize, commands: &[DrawIndexedIndirectCommand]);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SignedVertexOffsetSerializer;

impl IndexedIndirectCommandSerializer for SignedVertexOffsetSerializer {
    fn stride(&self) -> u32 {
        std::mem::size_of::<DrawIndexedIndirect>() as u32
    }

    fn serialize(&self, dest: &mut [u8], offset: usize, commands: &[DrawIndexedIndirectCommand]) {
        let stride = self.stride() as usize;
        for (i, command) in commands.iter().enumerate() {
            let native = DrawIndexedIndirect {
                index_count: command.index_count,
                instance_count: command.instance_count,
                first_index: command.first_index,
                base_vertex: command.vertex_offset,
                first_instance: command.first_instance,
            };
            let start = offset + i * stride;
            dest[start..start + stride].copy_from_slice(bytemuck::bytes_of(&native));
        }
    }
}

/// Stores the vertex offset as its two's complement bit pattern.
///
/// The reinterpretation is lossless, so negative offsets survive a round trip.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsignedVertexOffsetSerializer;

impl IndexedIndirectCommandSerializer for UnsignedVertexOffsetSerializer {
    fn stride(&self) -> u32 {
        std::mem::size_of::<DrawIndexedIndirectUnsigned>() as u32
    }

    fn serialize(&self, dest: &mut [u8], offset: usize, commands: &[DrawIndexedIndirectCommand]) {
        let stride = self.stride() as usize;
        for (i, command) in commands.iter().enumerate() {
            let native = DrawIndexedIndirectUnsigned {
                index_count: command.index_count,
                instance_count: command.instance_count,
                first_index: command.first_index,
                base_vertex: command.vertex_offset as u32,
                first_instance: command.first_instance,
            };
            let start = offset + i * stride;
            dest[start..start + stride].copy_from_slice(bytemuck::bytes_of(&native));
        }
    }
}

/// Pick the serializer matching the backend's indirect layout.
pub fn serializer_for_backend(backend: wgpu::Backend) -> Arc<dyn IndexedIndirectCommandSerializer> {
    match backend {
        wgpu::Backend::Metal | wgpu::Backend::Gl => Arc::new(UnsignedVertexOffsetSerializer),
        _ => Arc::new(SignedVertexOffsetSerializer),
    }
}

/// GPU buffer holding the single indirect command of a render page.
///
/// The buffer is either owned (allocated here, sized for one command) or
/// supplied by the caller together with an offset. Supplied buffers are never
/// destroyed by this type.
pub struct IndirectCommandBuffer {
    context: Arc<dyn RenderContext>,
    serializer: Arc<dyn IndexedIndirectCommandSerializer>,
    buffer: GpuBuffer,
    offset: u64,
    owned: bool,
    destroyed: bool,
    scratch: Vec<u8>,
}

impl IndirectCommandBuffer {
    /// Allocate a buffer for one command.
    pub fn new(
        context: Arc<dyn RenderContext>,
        serializer: Arc<dyn IndexedIndirectCommandSerializer>,
    ) -> Result<Self, SpriteBatchError> {
        let stride = serializer.stride();
        let buffer = context.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Sprite Indirect Buffer"),
            size: stride as u64,
            usage: wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })?;

        Ok(Self {
            context,
            serializer,
            buffer,
            offset: 0,
            owned: true,
            destroyed: false,
            scratch: vec![0; stride as usize],
        })
    }

    /// Use a caller-owned buffer, writing and drawing at `offset`.
    pub fn from_existing(
        context: Arc<dyn RenderContext>,
        serializer: Arc<dyn IndexedIndirectCommandSerializer>,
        buffer: GpuBuffer,
        offset: u64,
    ) -> Result<Self, SpriteBatchError> {
        let stride = serializer.stride();
        if offset > u32::MAX as u64 {
            return Err(SpriteBatchError::InvalidConfig(format!(
                "indirect offset {} does not fit in 32 bits",
                offset
            )));
        }
        if offset % 4 != 0 {
            return Err(SpriteBatchError::InvalidConfig(format!(
                "indirect offset {} is not 4-byte aligned",
                offset
            )));
        }
        if offset + stride as u64 > buffer.size() {
            return Err(SpriteBatchError::InvalidConfig(format!(
                "indirect command at {} overruns buffer of {} bytes",
                offset,
                buffer.size()
            )));
        }

        Ok(Self {
            context,
            serializer,
            buffer,
            offset,
            owned: false,
            destroyed: false,
            scratch: vec![0; stride as usize],
        })
    }

    pub fn buffer(&self) -> &GpuBuffer {
        &self.buffer
    }

    /// Byte offset used both for writing and for the indirect draw.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn stride(&self) -> u32 {
        self.serializer.stride()
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Serialize `command` and upload it.
    pub fn update(&mut self, command: &DrawIndexedIndirectCommand) -> Result<(), SpriteBatchError> {
        profile_function!();

        if self.destroyed {
            return Err(SpriteBatchError::InvalidOperation(
                "indirect command buffer was destroyed",
            ));
        }
        self.serializer
            .serialize(&mut self.scratch, 0, std::slice::from_ref(command));
        self.context.write_buffer(&self.buffer, self.offset, &self.scratch);
        Ok(())
    }

    /// Release the buffer if it is owned. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        if self.owned {
            self.context.destroy_buffer(&self.buffer);
        }
        self.destroyed = true;
    }
}

impl Drop for IndirectCommandBuffer {
    fn drop(&mut self) {
        self.destroy();
    }
}
