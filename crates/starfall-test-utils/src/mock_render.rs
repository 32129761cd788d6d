//! Mock implementation of RenderContext for testing.
//!
//! This module provides a mock GPU context that records operations
//! without actually interacting with the GPU.

use crate::{descriptors::*, error::DeviceError, gpu_types::*, render_context::RenderContext};
use parking_lot::Mutex;
use std::collections::HashMap;
use wgpu::*;

/// Records a GPU operation call for verification in tests.
#[derive(Debug, Clone)]
pub enum RenderCall {
    CreateBuffer {
        id: usize,
        label: Option<String>,
        size: u64,
        usage: BufferUsages,
    },
    WriteBuffer {
        buffer_id: usize,
        offset: u64,
        size: usize,
    },
    DestroyBuffer {
        buffer_id: usize,
    },
    CreateTexture {
        width: u32,
        height: u32,
        format: TextureFormat,
    },
    CreateTextureView {
        texture_id: usize,
    },
    CreateSampler {
        label: Option<String>,
    },
    CreateShaderModule {
        id: usize,
        label: Option<String>,
        size: usize,
    },
    DestroyShaderModule {
        id: usize,
    },
    CreateBindGroupLayout {
        id: usize,
        label: Option<String>,
        bindings: Vec<DescriptorSetLayoutBinding>,
    },
    DestroyBindGroupLayout {
        id: usize,
    },
    CreatePipelineLayout {
        id: usize,
        label: Option<String>,
        bind_group_layouts: usize,
    },
    DestroyPipelineLayout {
        id: usize,
    },
    CreateRenderPipeline {
        id: usize,
        label: Option<String>,
        vertex_entry_point: String,
        fragment_entry_point: String,
        vertex_strides: Vec<(u64, VertexStepMode)>,
        primitive: PrimitiveState,
        depth_stencil: Option<DepthStencilState>,
        color_targets: Vec<Option<ColorTargetState>>,
    },
    DestroyRenderPipeline {
        id: usize,
    },
    CreateDescriptorPool {
        id: usize,
        max_sets: u32,
        pool_sizes: Vec<DescriptorPoolSize>,
    },
    AllocateDescriptorSet {
        pool_id: usize,
        set_id: usize,
    },
    UpdateDescriptorSets {
        /// `(set, binding, first_array_element, descriptor_count)` per write
        writes: Vec<(usize, u32, u32, usize)>,
    },
    DestroyDescriptorPool {
        id: usize,
    },
}

/// A single operation the mock can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    CreateBuffer,
    CreateShaderModule,
    CreateBindGroupLayout,
    CreatePipelineLayout,
    CreateRenderPipeline,
    AllocateDescriptorSet,
}

/// Mock implementation of RenderContext for testing.
///
/// # Interior Mutability
///
/// Methods take `&self` but need to record calls, so state lives behind
/// `parking_lot::Mutex` (the trait requires `Send + Sync`).
///
/// Besides the call log the mock keeps the bytes written to each buffer and
/// the current contents of each descriptor set, so tests can assert on what
/// the GPU would actually see.
///
/// # Example
///
/// ```rust
/// use starfall_test_utils::{MockRenderContext, RenderContext};
/// use wgpu::*;
///
/// let mock = MockRenderContext::new();
///
/// let buffer = mock.create_buffer(&BufferDescriptor {
///     label: None,
///     size: 1024,
///     usage: BufferUsages::VERTEX,
///     mapped_at_creation: false,
/// }).unwrap();
///
/// assert!(buffer.is_mock());
/// assert_eq!(mock.count_buffer_creates(), 1);
/// ```
pub struct MockRenderContext {
    backend: Backend,
    limits: Limits,

    /// Recorded calls for verification
    calls: Mutex<Vec<RenderCall>>,

    /// Bytes of every live buffer, keyed by mock id
    buffer_contents: Mutex<HashMap<usize, Vec<u8>>>,

    /// Slot contents of every allocated descriptor set, keyed by mock id
    descriptor_sets: Mutex<HashMap<usize, DescriptorSetContents>>,

    /// Pending injected failures
    failures: Mutex<Vec<MockFailure>>,

    /// Shared id counter, so ids are unique across resource kinds
    next_id: Mutex<usize>,
}

impl MockRenderContext {
    /// Create a mock that reports the Vulkan backend and default limits,
    /// with binding arrays of up to 64 elements per stage.
    pub fn new() -> Self {
        Self::with_backend(Backend::Vulkan)
    }

    pub fn with_backend(backend: Backend) -> Self {
        Self {
            backend,
            limits: Limits {
                max_binding_array_elements_per_shader_stage: 64,
                max_binding_array_sampler_elements_per_shader_stage: 64,
                ..Limits::default()
            },
            calls: Mutex::new(Vec::new()),
            buffer_contents: Mutex::new(HashMap::new()),
            descriptor_sets: Mutex::new(HashMap::new()),
            failures: Mutex::new(Vec::new()),
            next_id: Mutex::new(0),
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Make the next call of the given kind fail.
    pub fn fail_next(&self, failure: MockFailure) {
        self.failures.lock().push(failure);
    }

    fn take_failure(&self, failure: MockFailure) -> bool {
        let mut failures = self.failures.lock();
        match failures.iter().position(|f| *f == failure) {
            Some(index) => {
                failures.remove(index);
                true
            }
            None => false,
        }
    }

    fn next_id(&self) -> usize {
        let mut id = self.next_id.lock();
        let current = *id;
        *id += 1;
        current
    }

    fn record(&self, call: RenderCall) {
        self.calls.lock().push(call);
    }

    /// Get a copy of all recorded calls (for test assertions).
    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().clone()
    }

    fn count(&self, predicate: impl Fn(&RenderCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    pub fn count_buffer_creates(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::CreateBuffer { .. }))
    }

    pub fn count_buffer_writes(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::WriteBuffer { .. }))
    }

    pub fn count_buffer_destroys(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::DestroyBuffer { .. }))
    }

    pub fn count_texture_creates(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::CreateTexture { .. }))
    }

    pub fn count_shader_creates(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::CreateShaderModule { .. }))
    }

    pub fn count_shader_destroys(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::DestroyShaderModule { .. }))
    }

    pub fn count_bind_group_layout_creates(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::CreateBindGroupLayout { .. }))
    }

    pub fn count_bind_group_layout_destroys(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::DestroyBindGroupLayout { .. }))
    }

    pub fn count_pipeline_layout_creates(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::CreatePipelineLayout { .. }))
    }

    pub fn count_pipeline_layout_destroys(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::DestroyPipelineLayout { .. }))
    }

    pub fn count_render_pipeline_creates(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::CreateRenderPipeline { .. }))
    }

    pub fn count_render_pipeline_destroys(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::DestroyRenderPipeline { .. }))
    }

    pub fn count_descriptor_updates(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::UpdateDescriptorSets { .. }))
    }

    pub fn count_descriptor_pool_destroys(&self) -> usize {
        self.count(|call| matches!(call, RenderCall::DestroyDescriptorPool { .. }))
    }

    /// Bytes last written to a mock buffer.
    ///
    /// Returns an empty vector for unknown or destroyed buffers.
    pub fn buffer_contents(&self, buffer: &GpuBuffer) -> Vec<u8> {
        buffer
            .mock_id()
            .and_then(|id| self.buffer_contents.lock().get(&id).cloned())
            .unwrap_or_default()
    }

    /// Current slot contents of a mock descriptor set.
    pub fn descriptor_set_contents(&self, set: &GpuDescriptorSet) -> Option<DescriptorSetContents> {
        let id = set.mock_id()?;
        self.descriptor_sets.lock().get(&id).cloned()
    }

    /// Clear recorded calls (useful between test steps).
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Default for MockRenderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderContext for MockRenderContext {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn limits(&self) -> Limits {
        self.limits.clone()
    }

    fn create_buffer(&self, desc: &BufferDescriptor) -> Result<GpuBuffer, DeviceError> {
        if self.take_failure(MockFailure::CreateBuffer) || desc.size > self.limits.max_buffer_size {
            return Err(DeviceError::OutOfMemory { requested: desc.size });
        }

        let id = self.next_id();
        self.buffer_contents.lock().insert(id, vec![0; desc.size as usize]);
        self.record(RenderCall::CreateBuffer {
            id,
            label: desc.label.map(|s| s.to_string()),
            size: desc.size,
            usage: desc.usage,
        });

        Ok(GpuBuffer::mock(id, desc.size))
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) {
        if let Some(buffer_id) = buffer.mock_id() {
            if let Some(bytes) = self.buffer_contents.lock().get_mut(&buffer_id) {
                let start = offset as usize;
                bytes[start..start + data.len()].copy_from_slice(data);
            }
            self.record(RenderCall::WriteBuffer {
                buffer_id,
                offset,
                size: data.len(),
            });
        }
    }

    fn destroy_buffer(&self, buffer: &GpuBuffer) {
        if let Some(buffer_id) = buffer.mock_id() {
            self.buffer_contents.lock().remove(&buffer_id);
            self.record(RenderCall::DestroyBuffer { buffer_id });
        }
    }

    fn create_texture(&self, desc: &TextureDescriptor) -> GpuTexture {
        let id = self.next_id();
        self.record(RenderCall::CreateTexture {
            width: desc.size.width,
            height: desc.size.height,
            format: desc.format,
        });
        GpuTexture::mock(id, desc.size.width, desc.size.height, desc.format)
    }

    fn create_texture_view(&self, texture: &GpuTexture) -> GpuTextureView {
        let id = self.next_id();
        self.record(RenderCall::CreateTextureView {
            texture_id: texture.mock_id().unwrap_or(usize::MAX),
        });
        GpuTextureView::mock(id)
    }

    fn create_sampler(&self, desc: &SamplerDescriptor) -> GpuSampler {
        let id = self.next_id();
        self.record(RenderCall::CreateSampler {
            label: desc.label.map(|s| s.to_string()),
        });
        GpuSampler::mock(id)
    }

    fn create_shader_module(&self, label: Option<&str>, code: &[u8]) -> Result<GpuShaderModule, DeviceError> {
        if self.take_failure(MockFailure::CreateShaderModule) || code.is_empty() {
            return Err(DeviceError::InvalidShader(format!(
                "mock rejected shader {:?}",
                label
            )));
        }

        let id = self.next_id();
        self.record(RenderCall::CreateShaderModule {
            id,
            label: label.map(|s| s.to_string()),
            size: code.len(),
        });
        Ok(GpuShaderModule::mock(id))
    }

    fn destroy_shader_module(&self, module: GpuShaderModule) {
        if let Some(id) = module.mock_id() {
            self.record(RenderCall::DestroyShaderModule { id });
        }
    }

    fn create_bind_group_layout(&self, desc: &DescriptorSetLayoutDescriptor) -> Result<GpuBindGroupLayout, DeviceError> {
        if self.take_failure(MockFailure::CreateBindGroupLayout) {
            return Err(DeviceError::Validation(format!(
                "mock rejected bind group layout {:?}",
                desc.label
            )));
        }

        let id = self.next_id();
        self.record(RenderCall::CreateBindGroupLayout {
            id,
            label: desc.label.map(|s| s.to_string()),
            bindings: desc.bindings.to_vec(),
        });
        Ok(GpuBindGroupLayout::mock(id, desc.bindings))
    }

    fn destroy_bind_group_layout(&self, layout: &GpuBindGroupLayout) {
        if let Some(id) = layout.mock_id() {
            self.record(RenderCall::DestroyBindGroupLayout { id });
        }
    }

    fn create_pipeline_layout(
        &self,
        label: Option<&str>,
        layouts: &[&GpuBindGroupLayout],
    ) -> Result<GpuPipelineLayout, DeviceError> {
        if self.take_failure(MockFailure::CreatePipelineLayout) {
            return Err(DeviceError::Validation(format!(
                "mock rejected pipeline layout {:?}",
                label
            )));
        }

        let id = self.next_id();
        self.record(RenderCall::CreatePipelineLayout {
            id,
            label: label.map(|s| s.to_string()),
            bind_group_layouts: layouts.len(),
        });
        Ok(GpuPipelineLayout::mock(id))
    }

    fn destroy_pipeline_layout(&self, layout: &GpuPipelineLayout) {
        if let Some(id) = layout.mock_id() {
            self.record(RenderCall::DestroyPipelineLayout { id });
        }
    }

    fn create_render_pipeline(&self, desc: &GraphicsPipelineDescriptor) -> Result<GpuRenderPipeline, DeviceError> {
        if self.take_failure(MockFailure::CreateRenderPipeline) {
            return Err(DeviceError::PipelineCreation(format!(
                "mock rejected pipeline {:?}",
                desc.label
            )));
        }

        let id = self.next_id();
        self.record(RenderCall::CreateRenderPipeline {
            id,
            label: desc.label.map(|s| s.to_string()),
            vertex_entry_point: desc.vertex.entry_point.to_string(),
            fragment_entry_point: desc.fragment.entry_point.to_string(),
            vertex_strides: desc
                .vertex_buffers
                .iter()
                .map(|layout| (layout.array_stride, layout.step_mode))
                .collect(),
            primitive: desc.primitive,
            depth_stencil: desc.depth_stencil.clone(),
            color_targets: desc.color_targets.to_vec(),
        });
        Ok(GpuRenderPipeline::mock(id))
    }

    fn destroy_render_pipeline(&self, pipeline: &GpuRenderPipeline) {
        if let Some(id) = pipeline.mock_id() {
            self.record(RenderCall::DestroyRenderPipeline { id });
        }
    }

    fn create_descriptor_pool(&self, desc: &DescriptorPoolDescriptor) -> GpuDescriptorPool {
        let id = self.next_id();
        self.record(RenderCall::CreateDescriptorPool {
            id,
            max_sets: desc.max_sets,
            pool_sizes: desc.pool_sizes.to_vec(),
        });
        GpuDescriptorPool::new(id, DescriptorPoolAccounting::new(desc))
    }

    fn allocate_descriptor_set(
        &self,
        pool: &GpuDescriptorPool,
        layout: &GpuBindGroupLayout,
    ) -> Result<GpuDescriptorSet, DeviceError> {
        if self.take_failure(MockFailure::AllocateDescriptorSet) {
            return Err(DeviceError::PoolExhausted {
                max_sets: pool.max_sets(),
            });
        }
        pool.reserve(layout)?;

        let set_id = self.next_id();
        self.descriptor_sets
            .lock()
            .insert(set_id, DescriptorSetContents::new(layout.bindings()));
        self.record(RenderCall::AllocateDescriptorSet {
            pool_id: pool.id(),
            set_id,
        });
        Ok(GpuDescriptorSet::mock(set_id))
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) -> Result<(), DeviceError> {
        let mut sets = self.descriptor_sets.lock();
        let mut recorded = Vec::with_capacity(writes.len());

        for write in writes {
            let set_id = write
                .set
                .mock_id()
                .ok_or(DeviceError::InvalidHandle("descriptor set"))?;
            let contents = sets
                .get_mut(&set_id)
                .ok_or(DeviceError::InvalidHandle("descriptor set"))?;
            contents.apply(write.binding, write.first_array_element, &write.resources)?;
            recorded.push((
                set_id,
                write.binding,
                write.first_array_element,
                write.resources.len(),
            ));
        }

        self.record(RenderCall::UpdateDescriptorSets { writes: recorded });
        Ok(())
    }

    fn destroy_descriptor_pool(&self, pool: &GpuDescriptorPool) {
        self.record(RenderCall::DestroyDescriptorPool { id: pool.id() });
    }
}
