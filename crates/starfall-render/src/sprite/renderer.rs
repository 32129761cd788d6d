use glam::Mat4;
use starfall_core::profiling::profile_function;
use starfall_test_utils::Viewport;

use crate::batch_buffer::BatchBuffer;
use crate::error::{CapacityResource, SpriteBatchError};
use crate::indirect::DrawIndexedIndirectCommand;

use super::types::{
    SpriteDraw, SpriteMaterialData, SpriteTexture, SpriteUV, SpriteVertex, SpriteVertexItem,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchState {
    Idle,
    Accumulating,
}

/// CPU side of a sprite batch.
///
/// Collects one [`SpriteVertexItem`] and one [`SpriteMaterialData`] per draw
/// between `begin` and `end` and keeps the indirect command in step with
/// them. Nothing here touches the GPU until [`SpriteBatchRenderer::write_to`].
#[derive(Debug)]
pub struct SpriteBatchRenderer {
    max_sprites: u32,
    texture_slots: u32,
    state: BatchState,
    projection: Mat4,
    items: Vec<SpriteVertexItem>,
    materials: Vec<SpriteMaterialData>,
    textures: Vec<SpriteTexture>,
    command: DrawIndexedIndirectCommand,
}

impl SpriteBatchRenderer {
    pub fn new(max_sprites: u32, texture_slots: u32) -> Self {
        Self {
            max_sprites,
            texture_slots,
            state: BatchState::Idle,
            projection: Mat4::IDENTITY,
            items: Vec::with_capacity(max_sprites as usize),
            materials: Vec::with_capacity(max_sprites as usize),
            textures: Vec::with_capacity(texture_slots as usize),
            command: DrawIndexedIndirectCommand::default(),
        }
    }

    /// Pixel-space projection for `viewport`: origin top-left, depth range
    /// `[-1, 0]`, shifted by half a pixel.
    pub fn projection(viewport: &Viewport) -> Mat4 {
        let mut projection = Mat4::orthographic_rh(0.0, viewport.width, viewport.height, 0.0, -1.0, 0.0);
        projection.w_axis.x -= 0.5 * projection.x_axis.x;
        projection.w_axis.y -= 0.5 * projection.y_axis.y;
        projection
    }

    pub fn set_viewport(&mut self, viewport: &Viewport) {
        self.projection = Self::projection(viewport);
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn is_accumulating(&self) -> bool {
        self.state == BatchState::Accumulating
    }

    pub fn begin(&mut self) -> Result<(), SpriteBatchError> {
        if self.is_accumulating() {
            return Err(SpriteBatchError::InvalidOperation("begin called twice without end"));
        }
        self.items.clear();
        self.materials.clear();
        self.textures.clear();
        self.command.reset();
        self.state = BatchState::Accumulating;
        Ok(())
    }

    /// Draw `texture` into the next free slot. Returns the slot used.
    pub fn draw(&mut self, texture: &SpriteTexture, draw: SpriteDraw) -> Result<u32, SpriteBatchError> {
        self.ensure_accumulating()?;
        self.ensure_sprite_room()?;

        let slot = self.textures.len() as u32;
        if slot >= self.texture_slots {
            return Err(SpriteBatchError::CapacityExceeded {
                resource: CapacityResource::TextureSlots,
                limit: self.texture_slots,
            });
        }

        self.textures.push(texture.clone());
        self.push(slot, texture.width, texture.height, &draw);
        Ok(slot)
    }

    /// Draw with a texture already bound to `slot` in this batch.
    pub fn draw_slot(&mut self, slot: u32, draw: SpriteDraw) -> Result<(), SpriteBatchError> {
        self.ensure_accumulating()?;
        let texture = self
            .textures
            .get(slot as usize)
            .ok_or(SpriteBatchError::TextureSlotOutOfRange {
                slot,
                bound: self.textures.len() as u32,
            })?;
        let (width, height) = (texture.width, texture.height);
        self.ensure_sprite_room()?;

        self.push(slot, width, height, &draw);
        Ok(())
    }

    fn push(&mut self, slot: u32, texture_width: u32, texture_height: u32, draw: &SpriteDraw) {
        let (uv, width, height) = match draw.source_rect {
            Some(rect) => (
                SpriteUV::from_source(rect, texture_width, texture_height),
                rect.width,
                rect.height,
            ),
            None => (SpriteUV::FULL, texture_width, texture_height),
        };
        let (tex_tl, tex_br) = uv.with_effects(draw.effects).as_arrays();
        let (sin, cos) = draw.rotation.sin_cos();

        self.items.push(SpriteVertexItem {
            x: draw.position.x,
            y: draw.position.y,
            depth: draw.depth,
            origin_x: -draw.origin.x,
            origin_y: -draw.origin.y,
            width: width as f32,
            height: height as f32,
            sin,
            cos,
            color: draw.color.to_packed(),
            tex_tl,
            tex_br,
        });
        self.materials.push(SpriteMaterialData::new(
            slot,
            draw.color,
            self.projection * draw.world_transform(),
        ));

        self.command.index_count += 6;
        self.command.instance_count += 1;
    }

    pub fn end(&mut self) -> Result<(), SpriteBatchError> {
        self.ensure_accumulating()?;
        self.state = BatchState::Idle;
        Ok(())
    }

    /// Serialize the accumulated sprites into `buffer`. Returns the bytes
    /// uploaded.
    pub fn write_to(&self, buffer: &mut BatchBuffer) -> Result<u64, SpriteBatchError> {
        profile_function!();

        let quads = self.items.len() as u32;
        let vertices: Vec<SpriteVertex> = self.items.iter().flat_map(|item| item.corners()).collect();

        let mut writer = buffer.map()?;
        writer.write_quad_indices(quads)?;
        writer.write_vertices(&vertices)?;
        writer.write_instance_indices(quads)?;
        writer.write_materials(&self.materials)?;
        Ok(writer.unmap())
    }

    pub fn items(&self) -> &[SpriteVertexItem] {
        &self.items
    }

    pub fn materials(&self) -> &[SpriteMaterialData] {
        &self.materials
    }

    /// Textures in slot order.
    pub fn textures(&self) -> &[SpriteTexture] {
        &self.textures
    }

    pub fn command(&self) -> &DrawIndexedIndirectCommand {
        &self.command
    }

    pub fn sprite_count(&self) -> u32 {
        self.items.len() as u32
    }

    pub fn max_sprites(&self) -> u32 {
        self.max_sprites
    }

    pub fn texture_slots(&self) -> u32 {
        self.texture_slots
    }

    fn ensure_accumulating(&self) -> Result<(), SpriteBatchError> {
        if self.is_accumulating() {
            Ok(())
        } else {
            Err(SpriteBatchError::InvalidOperation("draw called outside begin/end"))
        }
    }

    fn ensure_sprite_room(&self) -> Result<(), SpriteBatchError> {
        if self.items.len() as u32 >= self.max_sprites {
            return Err(SpriteBatchError::CapacityExceeded {
                resource: CapacityResource::Sprites,
                limit: self.max_sprites,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::sprite::{SourceRect, SpriteEffects};
    use glam::{Vec2, Vec4};
    use starfall_test_utils::{GpuSampler, GpuTextureView};

    fn texture(id: u64, width: u32, height: u32) -> SpriteTexture {
        SpriteTexture::new(
            id,
            GpuTextureView::mock(id as usize),
            GpuSampler::mock(id as usize),
            width,
            height,
        )
    }

    fn renderer() -> SpriteBatchRenderer {
        let mut renderer = SpriteBatchRenderer::new(8, 4);
        renderer.set_viewport(&Viewport::new(800.0, 600.0));
        renderer
    }

    #[test]
    fn test_projection_maps_corners() {
        let projection = SpriteBatchRenderer::projection(&Viewport::new(800.0, 600.0));
        let half_x = 1.0 / 800.0;
        let half_y = 1.0 / 600.0;

        let top_left = projection * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!((top_left.x - (-1.0 - half_x)).abs() < 1e-6);
        assert!((top_left.y - (1.0 + half_y)).abs() < 1e-6);

        let bottom_right = projection * Vec4::new(800.0, 600.0, 0.0, 1.0);
        assert!((bottom_right.x - (1.0 - half_x)).abs() < 1e-6);
        assert!((bottom_right.y - (-1.0 + half_y)).abs() < 1e-6);
    }

    #[test]
    fn test_projection_depth_range() {
        let projection = SpriteBatchRenderer::projection(&Viewport::new(800.0, 600.0));
        let far = projection * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let near = projection * Vec4::new(0.0, 0.0, 1.0, 1.0);
        assert!((far.z - 1.0).abs() < 1e-6);
        assert!(near.z.abs() < 1e-6);
    }

    #[test]
    fn test_counts_follow_draws() {
        let mut renderer = renderer();
        let tex = texture(1, 32, 32);

        renderer.begin().unwrap();
        for i in 0..3 {
            assert_eq!(renderer.draw(&tex, SpriteDraw::default()).unwrap(), i);
        }
        renderer.end().unwrap();

        assert_eq!(renderer.command().index_count, 18);
        assert_eq!(renderer.command().instance_count, 3);
        assert_eq!(renderer.items().len(), renderer.materials().len());
    }

    #[test]
    fn test_begin_resets_counts() {
        let mut renderer = renderer();
        let tex = texture(1, 32, 32);

        renderer.begin().unwrap();
        renderer.draw(&tex, SpriteDraw::default()).unwrap();
        renderer.end().unwrap();

        renderer.begin().unwrap();
        assert_eq!(renderer.command().index_count, 0);
        assert_eq!(renderer.sprite_count(), 0);
        assert!(renderer.textures().is_empty());
    }

    #[test]
    fn test_source_rect_and_flip() {
        let mut renderer = renderer();
        let tex = texture(1, 64, 32);

        renderer.begin().unwrap();
        renderer
            .draw(
                &tex,
                SpriteDraw::default()
                    .source_rect(SourceRect::new(16, 0, 16, 32))
                    .effects(SpriteEffects::FLIP_HORIZONTALLY),
            )
            .unwrap();

        let item = renderer.items()[0];
        assert_eq!(item.width, 16.0);
        assert_eq!(item.height, 32.0);
        assert_eq!(item.tex_tl, [0.5, 0.0]);
        assert_eq!(item.tex_br, [0.25, 1.0]);
    }

    #[test]
    fn test_origin_is_negated() {
        let mut renderer = renderer();
        renderer.begin().unwrap();
        renderer
            .draw(&texture(1, 32, 32), SpriteDraw::at(Vec2::new(5.0, 6.0)).origin(Vec2::new(16.0, 8.0)))
            .unwrap();

        let item = renderer.items()[0];
        assert_eq!((item.origin_x, item.origin_y), (-16.0, -8.0));
    }

    #[test]
    fn test_material_transform() {
        let mut renderer = renderer();
        let draw = SpriteDraw::at(Vec2::new(100.0, 50.0)).scale(2.0).color(Color::BLACK);

        renderer.begin().unwrap();
        renderer.draw(&texture(1, 32, 32), draw).unwrap();

        let material = renderer.materials()[0];
        let expected = renderer.projection_matrix() * draw.world_transform();
        assert_eq!(material.transform(), expected);
        assert_eq!(material.color, Color::BLACK.to_packed());
    }

    #[test]
    fn test_draw_outside_begin() {
        let mut renderer = renderer();
        let result = renderer.draw(&texture(1, 32, 32), SpriteDraw::default());
        assert!(matches!(result, Err(SpriteBatchError::InvalidOperation(_))));
        assert!(matches!(renderer.end(), Err(SpriteBatchError::InvalidOperation(_))));
    }

    #[test]
    fn test_nested_begin() {
        let mut renderer = renderer();
        renderer.begin().unwrap();
        assert!(matches!(renderer.begin(), Err(SpriteBatchError::InvalidOperation(_))));
    }

    #[test]
    fn test_texture_slot_capacity() {
        let mut renderer = renderer();
        let tex = texture(1, 32, 32);

        renderer.begin().unwrap();
        for _ in 0..4 {
            renderer.draw(&tex, SpriteDraw::default()).unwrap();
        }
        let result = renderer.draw(&tex, SpriteDraw::default());
        assert!(matches!(
            result,
            Err(SpriteBatchError::CapacityExceeded {
                resource: CapacityResource::TextureSlots,
                limit: 4
            })
        ));
        // A rejected draw leaves the batch untouched.
        assert_eq!(renderer.sprite_count(), 4);
        assert_eq!(renderer.command().instance_count, 4);
    }

    #[test]
    fn test_sprite_capacity_with_slots() {
        let mut renderer = renderer();
        renderer.begin().unwrap();
        renderer.draw(&texture(1, 32, 32), SpriteDraw::default()).unwrap();
        for _ in 1..8 {
            renderer.draw_slot(0, SpriteDraw::default()).unwrap();
        }
        assert!(matches!(
            renderer.draw_slot(0, SpriteDraw::default()),
            Err(SpriteBatchError::CapacityExceeded {
                resource: CapacityResource::Sprites,
                limit: 8
            })
        ));
        assert_eq!(renderer.textures().len(), 1);
    }

    #[test]
    fn test_draw_slot_requires_bound_slot() {
        let mut renderer = renderer();
        renderer.begin().unwrap();
        assert_eq!(
            renderer.draw_slot(0, SpriteDraw::default()),
            Err(SpriteBatchError::TextureSlotOutOfRange { slot: 0, bound: 0 })
        );
    }
}
