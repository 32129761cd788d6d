use std::sync::Arc;

/// Device features the sprite shaders need: a texture array indexed by a
/// per-instance slot.
pub const SPRITE_FEATURES: wgpu::Features = wgpu::Features::TEXTURE_BINDING_ARRAY
    .union(wgpu::Features::SAMPLED_TEXTURE_AND_STORAGE_BUFFER_ARRAY_NON_UNIFORM_INDEXING);

/// Texture array length requested by default.
pub const DEFAULT_BINDING_ARRAY_ELEMENTS: u32 = 64;

/// Errors from creating a [`GraphicsContext`].
#[derive(Debug, Clone, PartialEq)]
pub enum GraphicsError {
    /// No adapter matched the requested backends and options.
    NoAdapter,
    /// The adapter lacks required features.
    MissingFeatures(wgpu::Features),
    /// The device request was rejected.
    DeviceCreation(String),
}

impl std::fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphicsError::NoAdapter => write!(f, "Failed to find a suitable GPU adapter"),
            GraphicsError::MissingFeatures(features) => {
                write!(f, "Required GPU features are not supported: {:?}", features)
            }
            GraphicsError::DeviceCreation(msg) => write!(f, "Failed to create device: {}", msg),
        }
    }
}

impl std::error::Error for GraphicsError {}

/// A globally shared graphics context.
///
/// # Ownership Pattern
///
/// This type uses Arc for shared ownership:
///
/// ```rust,no_run
/// use starfall_render::GraphicsContext;
///
/// let ctx = GraphicsContext::new_owned_sync().expect("no GPU");
/// let ctx2 = ctx.clone(); // Cheap clone (Arc)
/// ```
///
/// It implements [`RenderContext`](starfall_test_utils::RenderContext), so
/// the sprite batch can run against it or against a mock.
pub struct GraphicsContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    /// 1x1 white texture bound in every unused texture slot.
    _fallback_texture: wgpu::Texture,
    pub(crate) fallback_view: wgpu::TextureView,
    pub(crate) fallback_sampler: wgpu::Sampler,
}

impl GraphicsContext {
    /// Creates a new graphics context with the default descriptor.
    pub async fn new_owned() -> Result<Arc<Self>, GraphicsError> {
        Self::new_owned_with_descriptor(GraphicsContextDescriptor::default()).await
    }

    /// Creates a new graphics context synchronously.
    ///
    /// This blocks the current thread until the context is created.
    pub fn new_owned_sync() -> Result<Arc<Self>, GraphicsError> {
        pollster::block_on(Self::new_owned())
    }

    /// Creates a new graphics context with a custom descriptor.
    pub async fn new_owned_with_descriptor(
        descriptor: GraphicsContextDescriptor,
    ) -> Result<Arc<Self>, GraphicsError> {
        let context = Self::create_context_internal(descriptor).await?;
        Ok(Arc::new(context))
    }

    async fn create_context_internal(descriptor: GraphicsContextDescriptor) -> Result<Self, GraphicsError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: descriptor.backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: descriptor.power_preference,
                compatible_surface: None,
                force_fallback_adapter: descriptor.force_fallback_adapter,
            })
            .await
            .map_err(|e| {
                tracing::error!("Adapter request failed: {}", e);
                GraphicsError::NoAdapter
            })?;

        let supported = adapter.features();
        let missing = descriptor.required_features - supported;
        if !missing.is_empty() {
            tracing::error!(
                "Adapter {:?} lacks required features {:?}",
                adapter.get_info().name,
                missing
            );
            return Err(GraphicsError::MissingFeatures(missing));
        }

        let available_requested = descriptor.requested_features & supported;
        let unavailable_requested = descriptor.requested_features - available_requested;
        if !unavailable_requested.is_empty() {
            tracing::warn!(
                "Some requested GPU features are not available: {:?}",
                unavailable_requested
            );
        }

        let features = descriptor.required_features | available_requested;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: features,
                required_limits: descriptor.limits.clone(),
                label: descriptor.label,
                ..Default::default()
            })
            .await
            .map_err(|e| GraphicsError::DeviceCreation(e.to_string()))?;

        let (fallback_texture, fallback_view, fallback_sampler) = create_fallback_texture(&device, &queue);

        tracing::info!(
            "Created graphics context on {:?} ({:?}) with features: {:?}",
            adapter.get_info().name,
            adapter.get_info().backend,
            features
        );

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            _fallback_texture: fallback_texture,
            fallback_view,
            fallback_sampler,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Get device info
    pub fn info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Get raw wgpu device features
    pub fn wgpu_features(&self) -> wgpu::Features {
        self.device.features()
    }

    /// Check if a texture format is supported for the given usages.
    pub fn supports_texture_format(&self, format: wgpu::TextureFormat, usages: wgpu::TextureUsages) -> bool {
        self.adapter
            .get_texture_format_features(format)
            .allowed_usages
            .contains(usages)
    }

    // =========================================================================
    // Limit Queries (Convenience Methods)
    // =========================================================================

    /// Get the maximum buffer size in bytes.
    #[inline]
    pub fn max_buffer_size(&self) -> u64 {
        self.device.limits().max_buffer_size
    }

    /// Get the minimum storage buffer offset alignment.
    ///
    /// The material region of the batch buffer starts at a multiple of this.
    #[inline]
    pub fn min_storage_buffer_offset_alignment(&self) -> u32 {
        self.device.limits().min_storage_buffer_offset_alignment
    }

    /// Get the maximum sampled textures per shader stage.
    #[inline]
    pub fn max_sampled_textures_per_shader_stage(&self) -> u32 {
        self.device.limits().max_sampled_textures_per_shader_stage
    }

    /// Get the maximum samplers per shader stage.
    #[inline]
    pub fn max_samplers_per_shader_stage(&self) -> u32 {
        self.device.limits().max_samplers_per_shader_stage
    }

    /// Get the maximum storage buffer binding size.
    #[inline]
    pub fn max_storage_buffer_binding_size(&self) -> u32 {
        self.device.limits().max_storage_buffer_binding_size
    }

    /// Get the maximum texture array length per shader stage.
    #[inline]
    pub fn max_binding_array_elements_per_shader_stage(&self) -> u32 {
        self.device.limits().max_binding_array_elements_per_shader_stage
    }
}

fn create_fallback_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> (wgpu::Texture, wgpu::TextureView, wgpu::Sampler) {
    let size = wgpu::Extent3d {
        width: 1,
        height: 1,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("sprite_fallback_texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[255, 255, 255, 255],
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("sprite_fallback_sampler"),
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });
    (texture, view, sampler)
}

/// Descriptor for configuring graphics context creation.
pub struct GraphicsContextDescriptor {
    /// GPU backends to use
    pub backends: wgpu::Backends,
    /// Power preference for adapter selection
    pub power_preference: wgpu::PowerPreference,
    /// Whether to force fallback adapter
    pub force_fallback_adapter: bool,
    /// Features the context cannot be created without.
    pub required_features: wgpu::Features,
    /// Features enabled when available (logs a warning otherwise).
    pub requested_features: wgpu::Features,
    /// Required device limits
    pub limits: wgpu::Limits,
    /// Optional label for debugging
    pub label: Option<&'static str>,
}

impl Default for GraphicsContextDescriptor {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            required_features: SPRITE_FEATURES,
            requested_features: wgpu::Features::empty(),
            limits: wgpu::Limits {
                max_binding_array_elements_per_shader_stage: DEFAULT_BINDING_ARRAY_ELEMENTS,
                max_binding_array_sampler_elements_per_shader_stage: DEFAULT_BINDING_ARRAY_ELEMENTS,
                ..wgpu::Limits::default()
            },
            label: None,
        }
    }
}

impl GraphicsContextDescriptor {
    /// Create a new descriptor with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add features the context cannot be created without.
    pub fn with_required_features(mut self, features: wgpu::Features) -> Self {
        self.required_features |= features;
        self
    }

    /// Add best-effort features.
    pub fn with_requested_features(mut self, features: wgpu::Features) -> Self {
        self.requested_features |= features;
        self
    }

    /// Set the power preference.
    pub fn power_preference(mut self, preference: wgpu::PowerPreference) -> Self {
        self.power_preference = preference;
        self
    }

    /// Set the backends to use.
    pub fn backends(mut self, backends: wgpu::Backends) -> Self {
        self.backends = backends;
        self
    }

    /// Force a software adapter.
    pub fn force_fallback_adapter(mut self, force: bool) -> Self {
        self.force_fallback_adapter = force;
        self
    }

    /// Set the device limits.
    pub fn limits(mut self, limits: wgpu::Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the debug label.
    pub fn label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_requires_sprite_features() {
        let desc = GraphicsContextDescriptor::new()
            .backends(wgpu::Backends::VULKAN)
            .label("test");
        assert!(desc.required_features.contains(SPRITE_FEATURES));
        assert_eq!(desc.backends, wgpu::Backends::VULKAN);
        assert_eq!(desc.label, Some("test"));
        assert_eq!(
            desc.limits.max_binding_array_elements_per_shader_stage,
            DEFAULT_BINDING_ARRAY_ELEMENTS
        );
    }

    #[test]
    fn test_graphics_error_display() {
        let err = GraphicsError::MissingFeatures(wgpu::Features::TEXTURE_BINDING_ARRAY);
        assert!(err.to_string().contains("TEXTURE_BINDING_ARRAY"));
    }
}
