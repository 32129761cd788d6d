//! Descriptor pool and batched descriptor set updates.
//!
//! A descriptor set is filled in cycles: `begin`, any number of `set_*`
//! calls, then `end`, which hands every pending write to the device in one
//! call.

use std::sync::Arc;

use starfall_core::profiling::profile_function;
use starfall_test_utils::{
    BufferInfo, DescriptorPoolDescriptor, DescriptorPoolSize, DescriptorResources, DescriptorType,
    DescriptorWrite, GpuBindGroupLayout, GpuDescriptorPool, GpuDescriptorSet, RenderContext,
};

use crate::error::{CapacityResource, SpriteBatchError};
use crate::sprite::SpriteTexture;

/// Pool that sets for one effect layout are allocated from.
pub struct EffectDescriptorPool {
    context: Arc<dyn RenderContext>,
    pool: GpuDescriptorPool,
    layout: GpuBindGroupLayout,
    destroyed: bool,
}

impl EffectDescriptorPool {
    pub fn new(
        context: Arc<dyn RenderContext>,
        layout: GpuBindGroupLayout,
        max_sets: u32,
        pool_sizes: &[DescriptorPoolSize],
    ) -> Self {
        let pool = context.create_descriptor_pool(&DescriptorPoolDescriptor {
            label: Some("Sprite Descriptor Pool"),
            max_sets,
            pool_sizes,
        });
        tracing::debug!("Created descriptor pool for {} sets", max_sets);

        Self {
            context,
            pool,
            layout,
            destroyed: false,
        }
    }

    pub fn pool(&self) -> &GpuDescriptorPool {
        &self.pool
    }

    pub fn max_sets(&self) -> u32 {
        self.pool.max_sets()
    }

    pub fn allocated_sets(&self) -> u32 {
        self.pool.allocated_sets()
    }

    pub fn create_descriptor_set(&self) -> Result<EffectDescriptorSet, SpriteBatchError> {
        if self.destroyed {
            return Err(SpriteBatchError::InvalidOperation("descriptor pool was destroyed"));
        }
        let set = self
            .context
            .allocate_descriptor_set(&self.pool, &self.layout)
            .inspect_err(|e| tracing::error!("Failed to allocate descriptor set: {}", e))?;

        Ok(EffectDescriptorSet {
            context: self.context.clone(),
            set,
            layout: self.layout.clone(),
            pending: Vec::new(),
            open: false,
        })
    }

    /// Release the pool and every set allocated from it. Safe to call more
    /// than once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.context.destroy_descriptor_pool(&self.pool);
        self.destroyed = true;
    }
}

impl Drop for EffectDescriptorPool {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// A descriptor set with batched writes.
pub struct EffectDescriptorSet {
    context: Arc<dyn RenderContext>,
    set: GpuDescriptorSet,
    layout: GpuBindGroupLayout,
    pending: Vec<DescriptorWrite>,
    open: bool,
}

impl EffectDescriptorSet {
    pub fn set(&self) -> &GpuDescriptorSet {
        &self.set
    }

    pub fn layout(&self) -> &GpuBindGroupLayout {
        &self.layout
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Writes recorded since `begin`.
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    pub fn begin(&mut self) -> Result<(), SpriteBatchError> {
        if self.open {
            return Err(SpriteBatchError::InvalidOperation(
                "descriptor set update already in progress",
            ));
        }
        self.pending.clear();
        self.open = true;
        Ok(())
    }

    /// Bind `textures` from `first_array_element` and clear every slot after
    /// them, so nothing from an earlier batch stays bound.
    pub fn set_textures(
        &mut self,
        binding: u32,
        first_array_element: u32,
        textures: &[SpriteTexture],
    ) -> Result<(), SpriteBatchError> {
        self.ensure_open()?;

        let slot_count = self.binding_count(binding, |ty| {
            matches!(ty, DescriptorType::CombinedImageSampler { .. })
        })?;
        let end = first_array_element as usize + textures.len();
        if end > slot_count as usize {
            return Err(SpriteBatchError::CapacityExceeded {
                resource: CapacityResource::TextureSlots,
                limit: slot_count,
            });
        }

        let mut images: Vec<_> = textures.iter().map(|t| Some(t.image_descriptor())).collect();
        images.resize(slot_count as usize - first_array_element as usize, None);

        self.pending.push(DescriptorWrite {
            set: self.set.clone(),
            binding,
            first_array_element,
            resources: DescriptorResources::CombinedImageSamplers(images),
        });
        Ok(())
    }

    pub fn set_storage_buffers(
        &mut self,
        binding: u32,
        first_array_element: u32,
        buffers: &[BufferInfo],
    ) -> Result<(), SpriteBatchError> {
        self.ensure_open()?;

        let count = self.binding_count(binding, |ty| matches!(ty, DescriptorType::StorageBuffer))?;
        if first_array_element as usize + buffers.len() > count as usize {
            return Err(SpriteBatchError::InvalidConfig(format!(
                "{} storage buffers from element {} overrun binding {}",
                buffers.len(),
                first_array_element,
                binding
            )));
        }

        self.pending.push(DescriptorWrite {
            set: self.set.clone(),
            binding,
            first_array_element,
            resources: DescriptorResources::StorageBuffers(buffers.to_vec()),
        });
        Ok(())
    }

    /// Apply all pending writes in one device call and close the cycle.
    ///
    /// Returns the number of writes applied.
    pub fn end(&mut self) -> Result<usize, SpriteBatchError> {
        profile_function!();
        self.ensure_open()?;
        self.open = false;

        let writes = std::mem::take(&mut self.pending);
        self.context
            .update_descriptor_sets(&writes)
            .inspect_err(|e| tracing::error!("Descriptor update failed: {}", e))?;
        Ok(writes.len())
    }

    /// Drop the pending writes and close the cycle without touching the
    /// device. The set keeps whatever the last `end` committed.
    pub fn abort(&mut self) {
        self.pending.clear();
        self.open = false;
    }

    fn ensure_open(&self) -> Result<(), SpriteBatchError> {
        if self.open {
            Ok(())
        } else {
            Err(SpriteBatchError::InvalidOperation(
                "descriptor set update was not begun",
            ))
        }
    }

    fn binding_count(
        &self,
        binding: u32,
        accepts: impl Fn(DescriptorType) -> bool,
    ) -> Result<u32, SpriteBatchError> {
        self.layout
            .bindings()
            .iter()
            .find(|b| b.binding == binding && accepts(b.ty))
            .map(|b| b.count)
            .ok_or_else(|| {
                SpriteBatchError::InvalidConfig(format!(
                    "binding {} does not exist or has another type",
                    binding
                ))
            })
    }
}
