//! GPU resource wrappers that can be real or mock.
//!
//! These types wrap wgpu resources and allow for both real GPU operations
//! and mock implementations for testing. All of them are cheap to clone.

use crate::descriptors::{DescriptorPoolAccounting, DescriptorSetContents, DescriptorSetLayoutBinding};
use crate::error::DeviceError;
use parking_lot::Mutex;
use std::sync::Arc;

/// Wrapper around GPU buffer that can be real or mock.
///
/// Users hold owned `GpuBuffer`, which is cheap to clone (wgpu handles are
/// reference counted).
#[derive(Clone, Debug)]
pub struct GpuBuffer {
    inner: GpuBufferInner,
}

#[derive(Clone, Debug)]
enum GpuBufferInner {
    Real(wgpu::Buffer),
    #[cfg(feature = "mock")]
    Mock { id: usize, size: u64 },
}

impl GpuBuffer {
    pub fn from_wgpu(buffer: wgpu::Buffer) -> Self {
        Self {
            inner: GpuBufferInner::Real(buffer),
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock(id: usize, size: u64) -> Self {
        Self {
            inner: GpuBufferInner::Mock { id, size },
        }
    }

    /// Get the underlying wgpu::Buffer (if real)
    ///
    /// # Panics
    /// Panics if this is a mock buffer (test code should never call this)
    pub fn as_wgpu(&self) -> &wgpu::Buffer {
        match &self.inner {
            GpuBufferInner::Real(buffer) => buffer,
            #[cfg(feature = "mock")]
            GpuBufferInner::Mock { .. } => {
                panic!("Attempted to get wgpu::Buffer from mock buffer - this is a test-only buffer")
            }
        }
    }

    pub fn size(&self) -> u64 {
        match &self.inner {
            GpuBufferInner::Real(buffer) => buffer.size(),
            #[cfg(feature = "mock")]
            GpuBufferInner::Mock { size, .. } => *size,
        }
    }

    #[cfg(feature = "mock")]
    pub fn is_mock(&self) -> bool {
        matches!(self.inner, GpuBufferInner::Mock { .. })
    }

    /// Get mock ID (for test assertions)
    #[cfg(feature = "mock")]
    pub fn mock_id(&self) -> Option<usize> {
        match &self.inner {
            GpuBufferInner::Mock { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// Wrapper around GPU texture that can be real or mock.
#[derive(Clone, Debug)]
pub struct GpuTexture {
    inner: GpuTextureInner,
}

#[derive(Clone, Debug)]
enum GpuTextureInner {
    Real(wgpu::Texture),
    #[cfg(feature = "mock")]
    Mock {
        id: usize,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    },
}

impl GpuTexture {
    pub fn from_wgpu(texture: wgpu::Texture) -> Self {
        Self {
            inner: GpuTextureInner::Real(texture),
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock(id: usize, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            inner: GpuTextureInner::Mock {
                id,
                width,
                height,
                format,
            },
        }
    }

    /// # Panics
    /// Panics if this is a mock texture
    pub fn as_wgpu(&self) -> &wgpu::Texture {
        match &self.inner {
            GpuTextureInner::Real(texture) => texture,
            #[cfg(feature = "mock")]
            GpuTextureInner::Mock { .. } => {
                panic!("Attempted to get wgpu::Texture from mock texture")
            }
        }
    }

    pub fn width(&self) -> u32 {
        match &self.inner {
            GpuTextureInner::Real(texture) => texture.width(),
            #[cfg(feature = "mock")]
            GpuTextureInner::Mock { width, .. } => *width,
        }
    }

    pub fn height(&self) -> u32 {
        match &self.inner {
            GpuTextureInner::Real(texture) => texture.height(),
            #[cfg(feature = "mock")]
            GpuTextureInner::Mock { height, .. } => *height,
        }
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        match &self.inner {
            GpuTextureInner::Real(texture) => texture.format(),
            #[cfg(feature = "mock")]
            GpuTextureInner::Mock { format, .. } => *format,
        }
    }

    #[cfg(feature = "mock")]
    pub fn is_mock(&self) -> bool {
        matches!(self.inner, GpuTextureInner::Mock { .. })
    }

    #[cfg(feature = "mock")]
    pub fn mock_id(&self) -> Option<usize> {
        match &self.inner {
            GpuTextureInner::Mock { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// Wrapper around GPU texture view that can be real or mock.
#[derive(Clone, Debug)]
pub struct GpuTextureView {
    inner: GpuTextureViewInner,
}

#[derive(Clone, Debug)]
enum GpuTextureViewInner {
    Real(wgpu::TextureView),
    #[cfg(feature = "mock")]
    Mock { id: usize },
}

impl GpuTextureView {
    pub fn from_wgpu(view: wgpu::TextureView) -> Self {
        Self {
            inner: GpuTextureViewInner::Real(view),
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock(id: usize) -> Self {
        Self {
            inner: GpuTextureViewInner::Mock { id },
        }
    }

    pub fn as_wgpu(&self) -> &wgpu::TextureView {
        match &self.inner {
            GpuTextureViewInner::Real(view) => view,
            #[cfg(feature = "mock")]
            GpuTextureViewInner::Mock { .. } => {
                panic!("Attempted to get wgpu::TextureView from mock")
            }
        }
    }

    #[cfg(feature = "mock")]
    pub fn is_mock(&self) -> bool {
        matches!(self.inner, GpuTextureViewInner::Mock { .. })
    }

    #[cfg(feature = "mock")]
    pub fn mock_id(&self) -> Option<usize> {
        match &self.inner {
            GpuTextureViewInner::Mock { id } => Some(*id),
            _ => None,
        }
    }
}

/// Wrapper around GPU sampler that can be real or mock.
#[derive(Clone, Debug)]
pub struct GpuSampler {
    inner: GpuSamplerInner,
}

#[derive(Clone, Debug)]
enum GpuSamplerInner {
    Real(wgpu::Sampler),
    #[cfg(feature = "mock")]
    Mock { id: usize },
}

impl GpuSampler {
    pub fn from_wgpu(sampler: wgpu::Sampler) -> Self {
        Self {
            inner: GpuSamplerInner::Real(sampler),
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock(id: usize) -> Self {
        Self {
            inner: GpuSamplerInner::Mock { id },
        }
    }

    pub fn as_wgpu(&self) -> &wgpu::Sampler {
        match &self.inner {
            GpuSamplerInner::Real(sampler) => sampler,
            #[cfg(feature = "mock")]
            GpuSamplerInner::Mock { .. } => {
                panic!("Attempted to get wgpu::Sampler from mock")
            }
        }
    }

    #[cfg(feature = "mock")]
    pub fn is_mock(&self) -> bool {
        matches!(self.inner, GpuSamplerInner::Mock { .. })
    }

    #[cfg(feature = "mock")]
    pub fn mock_id(&self) -> Option<usize> {
        match &self.inner {
            GpuSamplerInner::Mock { id } => Some(*id),
            _ => None,
        }
    }
}

/// Wrapper around GPU shader module that can be real or mock.
#[derive(Clone, Debug)]
pub struct GpuShaderModule {
    inner: GpuShaderModuleInner,
}

#[derive(Clone, Debug)]
enum GpuShaderModuleInner {
    Real(wgpu::ShaderModule),
    #[cfg(feature = "mock")]
    Mock { id: usize },
}

impl GpuShaderModule {
    pub fn from_wgpu(module: wgpu::ShaderModule) -> Self {
        Self {
            inner: GpuShaderModuleInner::Real(module),
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock(id: usize) -> Self {
        Self {
            inner: GpuShaderModuleInner::Mock { id },
        }
    }

    pub fn as_wgpu(&self) -> &wgpu::ShaderModule {
        match &self.inner {
            GpuShaderModuleInner::Real(module) => module,
            #[cfg(feature = "mock")]
            GpuShaderModuleInner::Mock { .. } => {
                panic!("Attempted to get wgpu::ShaderModule from mock")
            }
        }
    }

    #[cfg(feature = "mock")]
    pub fn is_mock(&self) -> bool {
        matches!(self.inner, GpuShaderModuleInner::Mock { .. })
    }

    #[cfg(feature = "mock")]
    pub fn mock_id(&self) -> Option<usize> {
        match &self.inner {
            GpuShaderModuleInner::Mock { id } => Some(*id),
            _ => None,
        }
    }
}

/// Wrapper around GPU render pipeline that can be real or mock.
#[derive(Clone, Debug)]
pub struct GpuRenderPipeline {
    inner: GpuRenderPipelineInner,
}

#[derive(Clone, Debug)]
enum GpuRenderPipelineInner {
    Real(wgpu::RenderPipeline),
    #[cfg(feature = "mock")]
    Mock { id: usize },
}

impl GpuRenderPipeline {
    pub fn from_wgpu(pipeline: wgpu::RenderPipeline) -> Self {
        Self {
            inner: GpuRenderPipelineInner::Real(pipeline),
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock(id: usize) -> Self {
        Self {
            inner: GpuRenderPipelineInner::Mock { id },
        }
    }

    pub fn as_wgpu(&self) -> &wgpu::RenderPipeline {
        match &self.inner {
            GpuRenderPipelineInner::Real(pipeline) => pipeline,
            #[cfg(feature = "mock")]
            GpuRenderPipelineInner::Mock { .. } => {
                panic!("Attempted to get wgpu::RenderPipeline from mock")
            }
        }
    }

    #[cfg(feature = "mock")]
    pub fn is_mock(&self) -> bool {
        matches!(self.inner, GpuRenderPipelineInner::Mock { .. })
    }

    #[cfg(feature = "mock")]
    pub fn mock_id(&self) -> Option<usize> {
        match &self.inner {
            GpuRenderPipelineInner::Mock { id } => Some(*id),
            _ => None,
        }
    }
}

/// Wrapper around GPU bind group layout that can be real or mock.
///
/// Both variants remember the bindings they were created from, which is what
/// descriptor sets are validated and padded against.
#[derive(Clone, Debug)]
pub struct GpuBindGroupLayout {
    inner: GpuBindGroupLayoutInner,
    bindings: Arc<[DescriptorSetLayoutBinding]>,
}

#[derive(Clone, Debug)]
enum GpuBindGroupLayoutInner {
    Real(wgpu::BindGroupLayout),
    #[cfg(feature = "mock")]
    Mock { id: usize },
}

impl GpuBindGroupLayout {
    pub fn from_wgpu(layout: wgpu::BindGroupLayout, bindings: &[DescriptorSetLayoutBinding]) -> Self {
        Self {
            inner: GpuBindGroupLayoutInner::Real(layout),
            bindings: bindings.into(),
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock(id: usize, bindings: &[DescriptorSetLayoutBinding]) -> Self {
        Self {
            inner: GpuBindGroupLayoutInner::Mock { id },
            bindings: bindings.into(),
        }
    }

    pub fn as_wgpu(&self) -> &wgpu::BindGroupLayout {
        match &self.inner {
            GpuBindGroupLayoutInner::Real(layout) => layout,
            #[cfg(feature = "mock")]
            GpuBindGroupLayoutInner::Mock { .. } => {
                panic!("Attempted to get wgpu::BindGroupLayout from mock")
            }
        }
    }

    pub fn bindings(&self) -> &[DescriptorSetLayoutBinding] {
        &self.bindings
    }

    #[cfg(feature = "mock")]
    pub fn is_mock(&self) -> bool {
        matches!(self.inner, GpuBindGroupLayoutInner::Mock { .. })
    }

    #[cfg(feature = "mock")]
    pub fn mock_id(&self) -> Option<usize> {
        match &self.inner {
            GpuBindGroupLayoutInner::Mock { id } => Some(*id),
            _ => None,
        }
    }
}

/// Wrapper around GPU pipeline layout that can be real or mock.
#[derive(Clone, Debug)]
pub struct GpuPipelineLayout {
    inner: GpuPipelineLayoutInner,
}

#[derive(Clone, Debug)]
enum GpuPipelineLayoutInner {
    Real(wgpu::PipelineLayout),
    #[cfg(feature = "mock")]
    Mock { id: usize },
}

impl GpuPipelineLayout {
    pub fn from_wgpu(layout: wgpu::PipelineLayout) -> Self {
        Self {
            inner: GpuPipelineLayoutInner::Real(layout),
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock(id: usize) -> Self {
        Self {
            inner: GpuPipelineLayoutInner::Mock { id },
        }
    }

    pub fn as_wgpu(&self) -> &wgpu::PipelineLayout {
        match &self.inner {
            GpuPipelineLayoutInner::Real(layout) => layout,
            #[cfg(feature = "mock")]
            GpuPipelineLayoutInner::Mock { .. } => {
                panic!("Attempted to get wgpu::PipelineLayout from mock")
            }
        }
    }

    #[cfg(feature = "mock")]
    pub fn is_mock(&self) -> bool {
        matches!(self.inner, GpuPipelineLayoutInner::Mock { .. })
    }

    #[cfg(feature = "mock")]
    pub fn mock_id(&self) -> Option<usize> {
        match &self.inner {
            GpuPipelineLayoutInner::Mock { id } => Some(*id),
            _ => None,
        }
    }
}

/// A descriptor pool.
///
/// wgpu has no pools, so both backends share the same accounting and only
/// differ in the sets they hand out.
#[derive(Clone, Debug)]
pub struct GpuDescriptorPool {
    id: usize,
    accounting: Arc<Mutex<DescriptorPoolAccounting>>,
}

impl GpuDescriptorPool {
    pub fn new(id: usize, accounting: DescriptorPoolAccounting) -> Self {
        Self {
            id,
            accounting: Arc::new(Mutex::new(accounting)),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn max_sets(&self) -> u32 {
        self.accounting.lock().max_sets()
    }

    pub fn allocated_sets(&self) -> u32 {
        self.accounting.lock().allocated_sets()
    }

    /// Reserve room for one set of the given layout.
    pub fn reserve(&self, layout: &GpuBindGroupLayout) -> Result<(), DeviceError> {
        self.accounting.lock().allocate(layout.bindings())
    }
}

/// State behind a real descriptor set.
///
/// wgpu bind groups are immutable, so the set keeps its slot contents and the
/// owning context rebuilds `bind_group` after every update.
#[derive(Debug)]
pub struct RealDescriptorSet {
    pub layout: wgpu::BindGroupLayout,
    pub contents: DescriptorSetContents,
    pub bind_group: Option<wgpu::BindGroup>,
}

/// Wrapper around a mutable descriptor set that can be real or mock.
#[derive(Clone, Debug)]
pub struct GpuDescriptorSet {
    inner: GpuDescriptorSetInner,
}

#[derive(Clone, Debug)]
enum GpuDescriptorSetInner {
    Real(Arc<Mutex<RealDescriptorSet>>),
    #[cfg(feature = "mock")]
    Mock { id: usize },
}

impl GpuDescriptorSet {
    pub fn from_real(set: RealDescriptorSet) -> Self {
        Self {
            inner: GpuDescriptorSetInner::Real(Arc::new(Mutex::new(set))),
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock(id: usize) -> Self {
        Self {
            inner: GpuDescriptorSetInner::Mock { id },
        }
    }

    pub fn as_real(&self) -> &Arc<Mutex<RealDescriptorSet>> {
        match &self.inner {
            GpuDescriptorSetInner::Real(set) => set,
            #[cfg(feature = "mock")]
            GpuDescriptorSetInner::Mock { .. } => {
                panic!("Attempted to get a real descriptor set from mock")
            }
        }
    }

    #[cfg(feature = "mock")]
    pub fn is_mock(&self) -> bool {
        matches!(self.inner, GpuDescriptorSetInner::Mock { .. })
    }

    #[cfg(feature = "mock")]
    pub fn mock_id(&self) -> Option<usize> {
        match &self.inner {
            GpuDescriptorSetInner::Mock { id } => Some(*id),
            _ => None,
        }
    }
}
