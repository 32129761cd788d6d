//! One GPU buffer holding every per-batch array of the sprite renderer.
//!
//! The buffer is split into four regions, each described by an offset, a
//! stride and an element count:
//!
//! | region    | contents                        | used as        |
//! |-----------|---------------------------------|----------------|
//! | indices   | 6 per quad                      | index buffer   |
//! | vertices  | 4 [`SpriteVertex`] per quad     | vertex buffer  |
//! | instances | `0..n` material indices         | vertex buffer  |
//! | materials | [`SpriteMaterialData`] per quad | storage buffer |
//!
//! The layout is fixed at construction. Writes go through a CPU shadow of the
//! buffer ([`BatchBuffer::map`]) which is uploaded in a single queue write when
//! the writer is unmapped.

use std::sync::Arc;

use bytemuck::Pod;
use starfall_core::profiling::profile_function;
use starfall_test_utils::{BufferInfo, GpuBuffer, RenderContext};

use crate::error::{CapacityResource, SpriteBatchError};
use crate::sprite::{INSTANCE_STRIDE, SpriteMaterialData, SpriteVertex};

/// Vertices addressable with 16-bit indices.
pub const MAX_U16_VERTICES: u32 = u16::MAX as u32 + 1;

/// Vertex and index buffer offsets must be multiples of this.
const VERTEX_ALIGNMENT: u64 = wgpu::VERTEX_STRIDE_ALIGNMENT;

/// Element counts and strides of the four regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchBufferDescriptor {
    pub index_format: wgpu::IndexFormat,
    pub indices_count: u32,
    pub vertices_count: u32,
    pub instances_count: u32,
    pub materials_count: u32,
    pub vertex_stride: u64,
    pub material_stride: u64,
}

impl BatchBufferDescriptor {
    /// Regions sized for `max_sprites` quads.
    ///
    /// Fails when the index count of that many quads does not fit in `u32`.
    pub fn for_sprites(max_sprites: u32, index_format: wgpu::IndexFormat) -> Result<Self, SpriteBatchError> {
        let too_many = || {
            SpriteBatchError::InvalidConfig(format!("max_sprites {} overflows the index count", max_sprites))
        };
        let indices_count = max_sprites.checked_mul(6).ok_or_else(too_many)?;
        let vertices_count = max_sprites
            .checked_mul(SpriteVertex::QUAD_VERTICES)
            .ok_or_else(too_many)?;

        Ok(Self {
            index_format,
            indices_count,
            vertices_count,
            instances_count: max_sprites,
            materials_count: max_sprites,
            vertex_stride: std::mem::size_of::<SpriteVertex>() as u64,
            material_stride: std::mem::size_of::<SpriteMaterialData>() as u64,
        })
    }

    pub fn index_stride(&self) -> u64 {
        match self.index_format {
            wgpu::IndexFormat::Uint16 => 2,
            wgpu::IndexFormat::Uint32 => 4,
        }
    }
}

/// Placement of one array inside the batch buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferRegion {
    pub offset: u64,
    pub stride: u64,
    pub count: u32,
}

impl BufferRegion {
    /// Size of the whole region in bytes.
    pub fn size(&self) -> u64 {
        self.stride * self.count as u64
    }

    pub fn end(&self) -> u64 {
        self.offset + self.size()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchBufferLayout {
    pub indices: BufferRegion,
    pub vertices: BufferRegion,
    pub instances: BufferRegion,
    pub materials: BufferRegion,
    pub total_size: u64,
}

fn align_to(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

impl BatchBufferLayout {
    /// Lay the regions out back to back.
    ///
    /// Vertex data is 4-byte aligned and the material region is aligned to
    /// `storage_alignment` so it can be bound as a storage buffer at its
    /// offset.
    pub fn compute(desc: &BatchBufferDescriptor, storage_alignment: u64) -> Result<Self, SpriteBatchError> {
        if desc.index_format == wgpu::IndexFormat::Uint16 && desc.vertices_count > MAX_U16_VERTICES {
            return Err(SpriteBatchError::CapacityExceeded {
                resource: CapacityResource::IndexRange,
                limit: MAX_U16_VERTICES,
            });
        }
        if desc.vertex_stride % VERTEX_ALIGNMENT != 0 {
            return Err(SpriteBatchError::InvalidConfig(format!(
                "vertex stride {} is not a multiple of {}",
                desc.vertex_stride, VERTEX_ALIGNMENT
            )));
        }

        let indices = BufferRegion {
            offset: 0,
            stride: desc.index_stride(),
            count: desc.indices_count,
        };
        let vertices = BufferRegion {
            offset: align_to(indices.end(), VERTEX_ALIGNMENT),
            stride: desc.vertex_stride,
            count: desc.vertices_count,
        };
        let instances = BufferRegion {
            offset: align_to(vertices.end(), VERTEX_ALIGNMENT),
            stride: INSTANCE_STRIDE,
            count: desc.instances_count,
        };
        let materials = BufferRegion {
            offset: align_to(instances.end(), storage_alignment.max(VERTEX_ALIGNMENT)),
            stride: desc.material_stride,
            count: desc.materials_count,
        };
        let total_size = align_to(materials.end(), wgpu::COPY_BUFFER_ALIGNMENT);

        Ok(Self {
            indices,
            vertices,
            instances,
            materials,
            total_size,
        })
    }
}

/// The index pattern of quad `quad`: two triangles over its four vertices.
pub const fn quad_indices(quad: u32) -> [u32; 6] {
    let m = quad * 4;
    [m, m + 1, m + 2, m + 1, m + 3, m + 2]
}

/// GPU buffer with the four sprite regions.
///
/// Owned by a single sprite batch. Call [`BatchBuffer::destroy`] to release
/// it explicitly; dropping does the same.
pub struct BatchBuffer {
    context: Arc<dyn RenderContext>,
    buffer: GpuBuffer,
    layout: BatchBufferLayout,
    index_format: wgpu::IndexFormat,
    shadow: Vec<u8>,
    quad_count: u32,
    destroyed: bool,
}

impl BatchBuffer {
    pub fn new(context: Arc<dyn RenderContext>, desc: &BatchBufferDescriptor) -> Result<Self, SpriteBatchError> {
        let alignment = context.limits().min_storage_buffer_offset_alignment as u64;
        let layout = BatchBufferLayout::compute(desc, alignment)?;

        let buffer = context
            .create_buffer(&wgpu::BufferDescriptor {
                label: Some("Sprite Batch Buffer"),
                size: layout.total_size,
                usage: wgpu::BufferUsages::INDEX
                    | wgpu::BufferUsages::VERTEX
                    | wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
            .inspect_err(|e| tracing::error!("Failed to allocate sprite batch buffer: {}", e))?;

        tracing::info!(
            "Created sprite batch buffer: {} bytes ({} indices, {} vertices, {} materials)",
            layout.total_size,
            desc.indices_count,
            desc.vertices_count,
            desc.materials_count
        );

        Ok(Self {
            context,
            buffer,
            layout,
            index_format: desc.index_format,
            shadow: vec![0; layout.total_size as usize],
            quad_count: 0,
            destroyed: false,
        })
    }

    pub fn buffer(&self) -> &GpuBuffer {
        &self.buffer
    }

    pub fn layout(&self) -> &BatchBufferLayout {
        &self.layout
    }

    pub fn index_format(&self) -> wgpu::IndexFormat {
        self.index_format
    }

    /// Quads written by the last unmapped writer.
    pub fn quad_count(&self) -> u32 {
        self.quad_count
    }

    /// Maximum number of quads the regions can hold.
    pub fn quad_capacity(&self) -> u32 {
        let layout = &self.layout;
        (layout.indices.count / 6)
            .min(layout.vertices.count / SpriteVertex::QUAD_VERTICES)
            .min(layout.instances.count)
            .min(layout.materials.count)
    }

    /// Descriptor info for binding the material region as a storage buffer.
    pub fn materials_binding(&self) -> BufferInfo {
        BufferInfo {
            buffer: self.buffer.clone(),
            offset: self.layout.materials.offset,
            range: self.layout.materials.size(),
        }
    }

    /// Forget what was written. The GPU contents are left alone.
    pub fn reset(&mut self) {
        self.quad_count = 0;
    }

    /// Start writing. The data reaches the GPU when the writer is unmapped.
    pub fn map(&mut self) -> Result<BatchBufferWriter<'_>, SpriteBatchError> {
        if self.destroyed {
            return Err(SpriteBatchError::InvalidOperation("batch buffer was destroyed"));
        }
        Ok(BatchBufferWriter {
            batch: self,
            quad_count: 0,
            unmapped: false,
        })
    }

    /// Release the GPU buffer. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.context.destroy_buffer(&self.buffer);
        self.shadow = Vec::new();
        self.destroyed = true;
    }
}

impl Drop for BatchBuffer {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// CPU view of a mapped [`BatchBuffer`].
pub struct BatchBufferWriter<'a> {
    batch: &'a mut BatchBuffer,
    quad_count: u32,
    unmapped: bool,
}

impl BatchBufferWriter<'_> {
    fn write_region<T: Pod>(
        &mut self,
        region: BufferRegion,
        first: u32,
        items: &[T],
    ) -> Result<(), SpriteBatchError> {
        if first as usize + items.len() > region.count as usize {
            return Err(SpriteBatchError::CapacityExceeded {
                resource: CapacityResource::Sprites,
                limit: region.count,
            });
        }
        let stride = region.stride as usize;
        let mut offset = (region.offset + first as u64 * region.stride) as usize;
        for item in items {
            let bytes = bytemuck::bytes_of(item);
            self.batch.shadow[offset..offset + bytes.len()].copy_from_slice(bytes);
            offset += stride;
        }
        Ok(())
    }

    /// Write the index pattern for quads `0..quad_count`.
    pub fn write_quad_indices(&mut self, quad_count: u32) -> Result<(), SpriteBatchError> {
        let region = self.batch.layout.indices;
        match self.batch.index_format {
            wgpu::IndexFormat::Uint16 => {
                let indices: Vec<u16> = (0..quad_count)
                    .flat_map(quad_indices)
                    .map(|index| index as u16)
                    .collect();
                self.write_region(region, 0, &indices)?;
            }
            wgpu::IndexFormat::Uint32 => {
                let indices: Vec<u32> = (0..quad_count).flat_map(quad_indices).collect();
                self.write_region(region, 0, &indices)?;
            }
        }
        self.quad_count = self.quad_count.max(quad_count);
        Ok(())
    }

    pub fn write_vertices(&mut self, vertices: &[SpriteVertex]) -> Result<(), SpriteBatchError> {
        let region = self.batch.layout.vertices;
        self.write_region(region, 0, vertices)
    }

    /// Write instance indices `0..count`.
    pub fn write_instance_indices(&mut self, count: u32) -> Result<(), SpriteBatchError> {
        let region = self.batch.layout.instances;
        let instances: Vec<u32> = (0..count).collect();
        self.write_region(region, 0, &instances)
    }

    pub fn write_materials(&mut self, materials: &[SpriteMaterialData]) -> Result<(), SpriteBatchError> {
        let region = self.batch.layout.materials;
        self.write_region(region, 0, materials)
    }

    /// Upload the shadow copy and return the number of bytes written.
    pub fn unmap(mut self) -> u64 {
        self.flush()
    }

    fn flush(&mut self) -> u64 {
        profile_function!();
        self.unmapped = true;
        self.batch.quad_count = self.quad_count;
        self.batch
            .context
            .write_buffer(&self.batch.buffer, 0, &self.batch.shadow);
        self.batch.shadow.len() as u64
    }
}

impl Drop for BatchBufferWriter<'_> {
    fn drop(&mut self) {
        if !self.unmapped {
            self.flush();
        }
    }
}
