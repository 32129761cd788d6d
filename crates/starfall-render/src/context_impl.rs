//! Implementation of the RenderContext trait for GraphicsContext.
//!
//! This allows GraphicsContext to be used polymorphically with the
//! RenderContext trait, enabling testing with MockRenderContext.

use std::num::{NonZeroU32, NonZeroU64};
use std::sync::Arc;

use parking_lot::Mutex;
use starfall_test_utils::{
    BindingSlots, DescriptorPoolAccounting, DescriptorPoolDescriptor, DescriptorSetContents,
    DescriptorSetLayoutBinding, DescriptorSetLayoutDescriptor, DescriptorType, DescriptorWrite, DeviceError,
    GpuBindGroupLayout, GpuBuffer, GpuDescriptorPool, GpuDescriptorSet, GpuPipelineLayout, GpuRenderPipeline,
    GpuSampler, GpuShaderModule, GpuTexture, GpuTextureView, GraphicsPipelineDescriptor, RealDescriptorSet,
    RenderContext,
};
use wgpu::{BufferDescriptor, SamplerDescriptor, TextureDescriptor};

use crate::context::GraphicsContext;

const SPIRV_MAGIC: u32 = 0x0723_0203;

static NEXT_POOL_ID: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(1);

impl GraphicsContext {
    /// Run `f` inside a validation error scope.
    pub(crate) fn validated<T>(&self, f: impl FnOnce() -> T) -> Result<T, wgpu::Error> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(error),
            None => Ok(value),
        }
    }

    fn layout_entries(bindings: &[DescriptorSetLayoutBinding]) -> Vec<wgpu::BindGroupLayoutEntry> {
        let mut entries = Vec::with_capacity(bindings.len() + 1);
        for binding in bindings {
            let count = if binding.count > 1 {
                NonZeroU32::new(binding.count)
            } else {
                None
            };
            match binding.ty {
                DescriptorType::CombinedImageSampler { sampler_binding } => {
                    entries.push(wgpu::BindGroupLayoutEntry {
                        binding: binding.binding,
                        visibility: binding.visibility,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count,
                    });
                    entries.push(wgpu::BindGroupLayoutEntry {
                        binding: sampler_binding,
                        visibility: binding.visibility,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count,
                    });
                }
                DescriptorType::StorageBuffer => entries.push(wgpu::BindGroupLayoutEntry {
                    binding: binding.binding,
                    visibility: binding.visibility,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count,
                }),
            }
        }
        entries
    }

    /// Recreate the bind group of `set` from its current contents.
    ///
    /// Unbound texture slots get the fallback texture. A set with an unbound
    /// storage buffer keeps no bind group until the buffer is written.
    fn rebuild_bind_group(&self, set: &mut RealDescriptorSet) {
        let contents = &set.contents;

        let mut views: Vec<Vec<&wgpu::TextureView>> = Vec::new();
        let mut samplers: Vec<Vec<&wgpu::Sampler>> = Vec::new();
        let mut buffers: Vec<wgpu::BufferBinding<'_>> = Vec::new();

        for (binding, slots) in contents.bindings().iter().zip(contents.slots()) {
            match slots {
                BindingSlots::Images(images) => {
                    views.push(
                        images
                            .iter()
                            .map(|image| image.as_ref().map_or(&self.fallback_view, |i| i.view.as_wgpu()))
                            .collect(),
                    );
                    samplers.push(
                        images
                            .iter()
                            .map(|image| {
                                image
                                    .as_ref()
                                    .map_or(&self.fallback_sampler, |i| i.sampler.as_wgpu())
                            })
                            .collect(),
                    );
                }
                BindingSlots::Buffers(slots) => {
                    for slot in slots {
                        let Some(info) = slot else {
                            tracing::trace!("Binding {} has no buffer yet, deferring bind group", binding.binding);
                            set.bind_group = None;
                            return;
                        };
                        buffers.push(wgpu::BufferBinding {
                            buffer: info.buffer.as_wgpu(),
                            offset: info.offset,
                            size: NonZeroU64::new(info.range),
                        });
                    }
                }
            }
        }

        let mut entries = Vec::new();
        let (mut image_index, mut buffer_index) = (0, 0);
        for binding in contents.bindings() {
            let single = binding.count <= 1;
            match binding.ty {
                DescriptorType::CombinedImageSampler { sampler_binding } => {
                    let (binding_views, binding_samplers) = (&views[image_index], &samplers[image_index]);
                    image_index += 1;
                    entries.push(wgpu::BindGroupEntry {
                        binding: binding.binding,
                        resource: if single {
                            wgpu::BindingResource::TextureView(binding_views[0])
                        } else {
                            wgpu::BindingResource::TextureViewArray(binding_views)
                        },
                    });
                    entries.push(wgpu::BindGroupEntry {
                        binding: sampler_binding,
                        resource: if single {
                            wgpu::BindingResource::Sampler(binding_samplers[0])
                        } else {
                            wgpu::BindingResource::SamplerArray(binding_samplers)
                        },
                    });
                }
                DescriptorType::StorageBuffer => {
                    let count = binding.count.max(1) as usize;
                    let binding_buffers = &buffers[buffer_index..buffer_index + count];
                    buffer_index += count;
                    entries.push(wgpu::BindGroupEntry {
                        binding: binding.binding,
                        resource: if single {
                            wgpu::BindingResource::Buffer(binding_buffers[0].clone())
                        } else {
                            wgpu::BindingResource::BufferArray(binding_buffers)
                        },
                    });
                }
            }
        }

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sprite_descriptor_set"),
            layout: &set.layout,
            entries: &entries,
        });
        set.bind_group = Some(bind_group);
    }
}

impl RenderContext for GraphicsContext {
    fn backend(&self) -> wgpu::Backend {
        self.adapter.get_info().backend
    }

    fn limits(&self) -> wgpu::Limits {
        self.device.limits()
    }

    fn create_buffer(&self, desc: &BufferDescriptor) -> Result<GpuBuffer, DeviceError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let buffer = self.device.create_buffer(desc);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());

        if oom.is_some() {
            return Err(DeviceError::OutOfMemory { requested: desc.size });
        }
        if let Some(error) = validation {
            return Err(DeviceError::Validation(error.to_string()));
        }
        Ok(GpuBuffer::from_wgpu(buffer))
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) {
        let wgpu_buffer = buffer.as_wgpu();
        self.queue.write_buffer(wgpu_buffer, offset, data);
    }

    fn destroy_buffer(&self, buffer: &GpuBuffer) {
        buffer.as_wgpu().destroy();
    }

    fn create_texture(&self, desc: &TextureDescriptor) -> GpuTexture {
        let texture = self.device.create_texture(desc);
        GpuTexture::from_wgpu(texture)
    }

    fn create_texture_view(&self, texture: &GpuTexture) -> GpuTextureView {
        let view = texture.as_wgpu().create_view(&wgpu::TextureViewDescriptor::default());
        GpuTextureView::from_wgpu(view)
    }

    fn create_sampler(&self, desc: &SamplerDescriptor) -> GpuSampler {
        let sampler = self.device.create_sampler(desc);
        GpuSampler::from_wgpu(sampler)
    }

    fn create_shader_module(&self, label: Option<&str>, code: &[u8]) -> Result<GpuShaderModule, DeviceError> {
        let is_spirv = code.len() >= 4 && u32::from_le_bytes([code[0], code[1], code[2], code[3]]) == SPIRV_MAGIC;
        let source = if is_spirv {
            wgpu::util::make_spirv(code)
        } else {
            let text = std::str::from_utf8(code)
                .map_err(|e| DeviceError::InvalidShader(format!("source is neither SPIR-V nor UTF-8: {}", e)))?;
            wgpu::ShaderSource::Wgsl(text.into())
        };

        self.validated(|| {
            self.device
                .create_shader_module(wgpu::ShaderModuleDescriptor { label, source })
        })
        .map(GpuShaderModule::from_wgpu)
        .map_err(|e| DeviceError::InvalidShader(e.to_string()))
    }

    fn destroy_shader_module(&self, module: GpuShaderModule) {
        drop(module);
    }

    fn create_bind_group_layout(&self, desc: &DescriptorSetLayoutDescriptor) -> Result<GpuBindGroupLayout, DeviceError> {
        let entries = Self::layout_entries(desc.bindings);
        self.validated(|| {
            self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: desc.label,
                entries: &entries,
            })
        })
        .map(|layout| GpuBindGroupLayout::from_wgpu(layout, desc.bindings))
        .map_err(|e| DeviceError::Validation(e.to_string()))
    }

    fn destroy_bind_group_layout(&self, _layout: &GpuBindGroupLayout) {
        // Freed with the last handle, like pipelines.
    }

    fn create_pipeline_layout(
        &self,
        label: Option<&str>,
        layouts: &[&GpuBindGroupLayout],
    ) -> Result<GpuPipelineLayout, DeviceError> {
        let bind_group_layouts: Vec<&wgpu::BindGroupLayout> = layouts.iter().map(|l| l.as_wgpu()).collect();
        self.validated(|| {
            self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label,
                bind_group_layouts: &bind_group_layouts,
                push_constant_ranges: &[],
            })
        })
        .map(GpuPipelineLayout::from_wgpu)
        .map_err(|e| DeviceError::Validation(e.to_string()))
    }

    fn destroy_pipeline_layout(&self, _layout: &GpuPipelineLayout) {}

    fn create_render_pipeline(&self, desc: &GraphicsPipelineDescriptor) -> Result<GpuRenderPipeline, DeviceError> {
        self.validated(|| {
            self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: desc.label,
                layout: Some(desc.layout.as_wgpu()),
                vertex: wgpu::VertexState {
                    module: desc.vertex.module.as_wgpu(),
                    entry_point: Some(desc.vertex.entry_point),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: desc.vertex_buffers,
                },
                primitive: desc.primitive,
                depth_stencil: desc.depth_stencil.clone(),
                multisample: desc.multisample,
                fragment: Some(wgpu::FragmentState {
                    module: desc.fragment.module.as_wgpu(),
                    entry_point: Some(desc.fragment.entry_point),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: desc.color_targets,
                }),
                multiview: None,
                cache: None,
            })
        })
        .map(GpuRenderPipeline::from_wgpu)
        .map_err(|e| DeviceError::PipelineCreation(e.to_string()))
    }

    fn destroy_render_pipeline(&self, _pipeline: &GpuRenderPipeline) {
        // wgpu frees the pipeline once the last handle is dropped.
    }

    fn create_descriptor_pool(&self, desc: &DescriptorPoolDescriptor) -> GpuDescriptorPool {
        let id = NEXT_POOL_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        GpuDescriptorPool::new(id, DescriptorPoolAccounting::new(desc))
    }

    fn allocate_descriptor_set(
        &self,
        pool: &GpuDescriptorPool,
        layout: &GpuBindGroupLayout,
    ) -> Result<GpuDescriptorSet, DeviceError> {
        pool.reserve(layout)?;
        Ok(GpuDescriptorSet::from_real(RealDescriptorSet {
            layout: layout.as_wgpu().clone(),
            contents: DescriptorSetContents::new(layout.bindings()),
            bind_group: None,
        }))
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) -> Result<(), DeviceError> {
        let mut touched: Vec<Arc<Mutex<RealDescriptorSet>>> = Vec::new();
        for write in writes {
            let set = write.set.as_real();
            set.lock()
                .contents
                .apply(write.binding, write.first_array_element, &write.resources)?;
            if !touched.iter().any(|t| Arc::ptr_eq(t, set)) {
                touched.push(set.clone());
            }
        }

        for set in &touched {
            let mut set = set.lock();
            self.validated(|| self.rebuild_bind_group(&mut set))
                .map_err(|e| DeviceError::InvalidDescriptorWrite(e.to_string()))?;
        }
        Ok(())
    }

    fn destroy_descriptor_pool(&self, _pool: &GpuDescriptorPool) {
        // Sets own their bind groups; nothing is pooled on the device.
    }
}
