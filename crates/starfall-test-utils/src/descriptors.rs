//! Descriptors that reference wrapped GPU resources.
//!
//! wgpu descriptors borrow concrete `wgpu::*` handles, which a mock cannot
//! provide. The types here carry [`GpuBuffer`], [`GpuTextureView`] and friends
//! instead, and the real context converts them at the last moment.

use crate::error::DeviceError;
use crate::gpu_types::*;

// =============================================================================
// Descriptor set layouts and pools
// =============================================================================

/// Kind of resource bound at a descriptor binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorType {
    /// An array of sampled textures paired with an array of samplers.
    ///
    /// wgpu has no combined image sampler, so the samplers live at their own
    /// binding index.
    CombinedImageSampler { sampler_binding: u32 },
    /// A read-only storage buffer.
    StorageBuffer,
}

impl DescriptorType {
    fn pool_kind(&self) -> DescriptorPoolKind {
        match self {
            DescriptorType::CombinedImageSampler { .. } => DescriptorPoolKind::CombinedImageSampler,
            DescriptorType::StorageBuffer => DescriptorPoolKind::StorageBuffer,
        }
    }
}

/// One binding of a descriptor set layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorSetLayoutBinding {
    pub binding: u32,
    pub ty: DescriptorType,
    /// Array length. Always at least 1.
    pub count: u32,
    pub visibility: wgpu::ShaderStages,
}

#[derive(Debug, Clone)]
pub struct DescriptorSetLayoutDescriptor<'a> {
    pub label: Option<&'a str>,
    pub bindings: &'a [DescriptorSetLayoutBinding],
}

/// Pool accounting bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorPoolKind {
    CombinedImageSampler,
    StorageBuffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolSize {
    pub kind: DescriptorPoolKind,
    pub count: u32,
}

#[derive(Debug, Clone)]
pub struct DescriptorPoolDescriptor<'a> {
    pub label: Option<&'a str>,
    pub max_sets: u32,
    pub pool_sizes: &'a [DescriptorPoolSize],
}

/// Bookkeeping shared by every backend's descriptor pool.
#[derive(Debug, Clone)]
pub struct DescriptorPoolAccounting {
    max_sets: u32,
    allocated_sets: u32,
    remaining: Vec<DescriptorPoolSize>,
}

impl DescriptorPoolAccounting {
    pub fn new(desc: &DescriptorPoolDescriptor) -> Self {
        Self {
            max_sets: desc.max_sets,
            allocated_sets: 0,
            remaining: desc.pool_sizes.to_vec(),
        }
    }

    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }

    pub fn allocated_sets(&self) -> u32 {
        self.allocated_sets
    }

    /// Reserve room for one set with the given layout.
    pub fn allocate(&mut self, bindings: &[DescriptorSetLayoutBinding]) -> Result<(), DeviceError> {
        if self.allocated_sets >= self.max_sets {
            return Err(DeviceError::PoolExhausted {
                max_sets: self.max_sets,
            });
        }

        let mut remaining = self.remaining.clone();
        for binding in bindings {
            let kind = binding.ty.pool_kind();
            let bucket = remaining
                .iter_mut()
                .find(|size| size.kind == kind)
                .filter(|size| size.count >= binding.count)
                .ok_or(DeviceError::PoolExhausted {
                    max_sets: self.max_sets,
                })?;
            bucket.count -= binding.count;
        }

        self.remaining = remaining;
        self.allocated_sets += 1;
        Ok(())
    }
}

// =============================================================================
// Descriptor writes
// =============================================================================

/// Image layout a sampled texture is expected to be in when read.
///
/// wgpu tracks layouts itself; the value is carried so the write stays
/// explicit about how the image is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLayout {
    ShaderReadOnlyOptimal,
    General,
}

#[derive(Debug, Clone)]
pub struct ImageDescriptor {
    pub view: GpuTextureView,
    pub sampler: GpuSampler,
    pub layout: ImageLayout,
}

#[derive(Debug, Clone)]
pub struct BufferInfo {
    pub buffer: GpuBuffer,
    pub offset: u64,
    pub range: u64,
}

#[derive(Debug, Clone)]
pub enum DescriptorResources {
    /// `None` leaves the element unbound.
    CombinedImageSamplers(Vec<Option<ImageDescriptor>>),
    StorageBuffers(Vec<BufferInfo>),
}

impl DescriptorResources {
    pub fn len(&self) -> usize {
        match self {
            DescriptorResources::CombinedImageSamplers(images) => images.len(),
            DescriptorResources::StorageBuffers(buffers) => buffers.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single update of a contiguous range of one binding.
#[derive(Debug, Clone)]
pub struct DescriptorWrite {
    pub set: GpuDescriptorSet,
    pub binding: u32,
    pub first_array_element: u32,
    pub resources: DescriptorResources,
}

/// Current contents of every binding of a descriptor set.
#[derive(Debug, Clone)]
pub struct DescriptorSetContents {
    bindings: Vec<DescriptorSetLayoutBinding>,
    slots: Vec<BindingSlots>,
}

#[derive(Debug, Clone)]
pub enum BindingSlots {
    Images(Vec<Option<ImageDescriptor>>),
    Buffers(Vec<Option<BufferInfo>>),
}

impl DescriptorSetContents {
    pub fn new(bindings: &[DescriptorSetLayoutBinding]) -> Self {
        let slots = bindings
            .iter()
            .map(|binding| match binding.ty {
                DescriptorType::CombinedImageSampler { .. } => {
                    BindingSlots::Images(vec![None; binding.count as usize])
                }
                DescriptorType::StorageBuffer => {
                    BindingSlots::Buffers(vec![None; binding.count as usize])
                }
            })
            .collect();
        Self {
            bindings: bindings.to_vec(),
            slots,
        }
    }

    pub fn bindings(&self) -> &[DescriptorSetLayoutBinding] {
        &self.bindings
    }

    pub fn slots(&self) -> &[BindingSlots] {
        &self.slots
    }

    pub fn image(&self, binding: u32, element: u32) -> Option<&ImageDescriptor> {
        let index = self.bindings.iter().position(|b| b.binding == binding)?;
        match &self.slots[index] {
            BindingSlots::Images(images) => images.get(element as usize)?.as_ref(),
            BindingSlots::Buffers(_) => None,
        }
    }

    pub fn buffer(&self, binding: u32, element: u32) -> Option<&BufferInfo> {
        let index = self.bindings.iter().position(|b| b.binding == binding)?;
        match &self.slots[index] {
            BindingSlots::Buffers(buffers) => buffers.get(element as usize)?.as_ref(),
            BindingSlots::Images(_) => None,
        }
    }

    /// Replace `[first_array_element, first_array_element + len)` of a binding.
    pub fn apply(
        &mut self,
        binding: u32,
        first_array_element: u32,
        resources: &DescriptorResources,
    ) -> Result<(), DeviceError> {
        let index = self
            .bindings
            .iter()
            .position(|b| b.binding == binding)
            .ok_or_else(|| {
                DeviceError::InvalidDescriptorWrite(format!("binding {} is not in the layout", binding))
            })?;

        let count = self.bindings[index].count as usize;
        let start = first_array_element as usize;
        let end = start + resources.len();
        if end > count {
            return Err(DeviceError::InvalidDescriptorWrite(format!(
                "elements {}..{} exceed binding {} array of {}",
                start, end, binding, count
            )));
        }

        match (&mut self.slots[index], resources) {
            (BindingSlots::Images(slots), DescriptorResources::CombinedImageSamplers(images)) => {
                slots[start..end].clone_from_slice(images);
            }
            (BindingSlots::Buffers(slots), DescriptorResources::StorageBuffers(buffers)) => {
                for (slot, buffer) in slots[start..end].iter_mut().zip(buffers) {
                    *slot = Some(buffer.clone());
                }
            }
            _ => {
                return Err(DeviceError::InvalidDescriptorWrite(format!(
                    "resource type does not match binding {}",
                    binding
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Pipelines
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct ShaderStage<'a> {
    pub module: &'a GpuShaderModule,
    pub entry_point: &'a str,
}

/// Everything needed to build one graphics pipeline.
#[derive(Debug, Clone)]
pub struct GraphicsPipelineDescriptor<'a> {
    pub label: Option<&'a str>,
    pub layout: &'a GpuPipelineLayout,
    pub vertex: ShaderStage<'a>,
    pub fragment: ShaderStage<'a>,
    pub vertex_buffers: &'a [wgpu::VertexBufferLayout<'a>],
    pub primitive: wgpu::PrimitiveState,
    pub depth_stencil: Option<wgpu::DepthStencilState>,
    pub multisample: wgpu::MultisampleState,
    pub color_targets: &'a [Option<wgpu::ColorTargetState>],
}

// =============================================================================
// Render passes and framebuffers
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp {
    Load,
    Clear,
    DontCare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentDescription {
    pub format: wgpu::TextureFormat,
    pub load_op: LoadOp,
    pub stencil_load_op: LoadOp,
}

impl AttachmentDescription {
    pub fn color(format: wgpu::TextureFormat, load_op: LoadOp) -> Self {
        Self {
            format,
            load_op,
            stencil_load_op: LoadOp::DontCare,
        }
    }

    pub fn depth_stencil(format: wgpu::TextureFormat, load_op: LoadOp, stencil_load_op: LoadOp) -> Self {
        Self {
            format,
            load_op,
            stencil_load_op,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubpassDescription {
    /// Indices into [`RenderPassInfo::attachments`].
    pub color_attachments: Vec<u32>,
    pub depth_stencil_attachment: Option<u32>,
}

/// Attachment and subpass structure of a render pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderPassInfo {
    pub attachments: Vec<AttachmentDescription>,
    pub subpasses: Vec<SubpassDescription>,
}

impl RenderPassInfo {
    /// Formats of the colour attachments of the first subpass.
    pub fn color_formats(&self) -> Vec<wgpu::TextureFormat> {
        self.subpasses
            .first()
            .map(|subpass| {
                subpass
                    .color_attachments
                    .iter()
                    .filter_map(|&index| self.attachments.get(index as usize))
                    .map(|attachment| attachment.format)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Format of the depth/stencil attachment of the first subpass.
    pub fn depth_stencil_format(&self) -> Option<wgpu::TextureFormat> {
        let index = self.subpasses.first()?.depth_stencil_attachment?;
        self.attachments.get(index as usize).map(|a| a.format)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderArea {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl RenderArea {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Attachment views for one render pass instance, in declaration order.
#[derive(Debug, Clone)]
pub struct Framebuffer {
    pub attachments: Vec<GpuTextureView>,
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texture_binding(count: u32) -> DescriptorSetLayoutBinding {
        DescriptorSetLayoutBinding {
            binding: 0,
            ty: DescriptorType::CombinedImageSampler { sampler_binding: 2 },
            count,
            visibility: wgpu::ShaderStages::FRAGMENT,
        }
    }

    fn storage_binding() -> DescriptorSetLayoutBinding {
        DescriptorSetLayoutBinding {
            binding: 1,
            ty: DescriptorType::StorageBuffer,
            count: 1,
            visibility: wgpu::ShaderStages::VERTEX,
        }
    }

    #[test]
    fn test_pool_accounting_limits_sets() {
        let sizes = [
            DescriptorPoolSize {
                kind: DescriptorPoolKind::CombinedImageSampler,
                count: 32,
            },
            DescriptorPoolSize {
                kind: DescriptorPoolKind::StorageBuffer,
                count: 2,
            },
        ];
        let mut pool = DescriptorPoolAccounting::new(&DescriptorPoolDescriptor {
            label: None,
            max_sets: 2,
            pool_sizes: &sizes,
        });
        let layout = [texture_binding(16), storage_binding()];

        assert!(pool.allocate(&layout).is_ok());
        assert!(pool.allocate(&layout).is_ok());
        assert_eq!(
            pool.allocate(&layout),
            Err(DeviceError::PoolExhausted { max_sets: 2 })
        );
        assert_eq!(pool.allocated_sets(), 2);
    }

    #[test]
    fn test_pool_accounting_limits_descriptors() {
        let sizes = [DescriptorPoolSize {
            kind: DescriptorPoolKind::CombinedImageSampler,
            count: 8,
        }];
        let mut pool = DescriptorPoolAccounting::new(&DescriptorPoolDescriptor {
            label: None,
            max_sets: 4,
            pool_sizes: &sizes,
        });

        assert!(pool.allocate(&[texture_binding(16)]).is_err());
        // A failed allocation must not consume anything.
        assert_eq!(pool.allocated_sets(), 0);
        assert!(pool.allocate(&[texture_binding(8)]).is_ok());
    }

    #[test]
    fn test_contents_reject_out_of_range_write() {
        let mut contents = DescriptorSetContents::new(&[texture_binding(2)]);
        let result = contents.apply(
            0,
            1,
            &DescriptorResources::CombinedImageSamplers(vec![None, None]),
        );
        assert!(matches!(result, Err(DeviceError::InvalidDescriptorWrite(_))));
    }

    #[test]
    fn test_contents_reject_type_mismatch() {
        let mut contents = DescriptorSetContents::new(&[storage_binding()]);
        let result = contents.apply(1, 0, &DescriptorResources::CombinedImageSamplers(vec![None]));
        assert!(result.is_err());
    }

    #[test]
    fn test_render_pass_formats() {
        let info = RenderPassInfo {
            attachments: vec![
                AttachmentDescription::color(wgpu::TextureFormat::Bgra8Unorm, LoadOp::Clear),
                AttachmentDescription::depth_stencil(
                    wgpu::TextureFormat::Depth24PlusStencil8,
                    LoadOp::Clear,
                    LoadOp::DontCare,
                ),
            ],
            subpasses: vec![SubpassDescription {
                color_attachments: vec![0],
                depth_stencil_attachment: Some(1),
            }],
        };
        assert_eq!(info.color_formats(), vec![wgpu::TextureFormat::Bgra8Unorm]);
        assert_eq!(
            info.depth_stencil_format(),
            Some(wgpu::TextureFormat::Depth24PlusStencil8)
        );
    }
}
