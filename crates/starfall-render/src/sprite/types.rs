//! Per-sprite data produced by `draw` and serialized at `end`.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};
use starfall_test_utils::{GpuSampler, GpuTextureView, ImageDescriptor, ImageLayout};

use crate::color::Color;

bitflags::bitflags! {
    /// Mirroring applied to a sprite's texture coordinates.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SpriteEffects: u32 {
        const FLIP_HORIZONTALLY = 1 << 0;
        const FLIP_VERTICALLY = 1 << 1;
    }
}

/// Pixel rectangle inside a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SourceRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// UV coordinates for a sprite (normalized 0-1 range).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteUV {
    /// U coordinate of the left edge
    pub u_min: f32,
    /// V coordinate of the top edge
    pub v_min: f32,
    /// U coordinate of the right edge
    pub u_max: f32,
    /// V coordinate of the bottom edge
    pub v_max: f32,
}

impl SpriteUV {
    /// The whole texture.
    pub const FULL: SpriteUV = SpriteUV {
        u_min: 0.0,
        v_min: 0.0,
        u_max: 1.0,
        v_max: 1.0,
    };

    pub fn new(u_min: f32, v_min: f32, u_max: f32, v_max: f32) -> Self {
        Self {
            u_min,
            v_min,
            u_max,
            v_max,
        }
    }

    /// Normalize a pixel rectangle by the texture size.
    pub fn from_source(rect: SourceRect, texture_width: u32, texture_height: u32) -> Self {
        let w = texture_width as f32;
        let h = texture_height as f32;
        Self {
            u_min: rect.x as f32 / w,
            v_min: rect.y as f32 / h,
            u_max: (rect.x + rect.width) as f32 / w,
            v_max: (rect.y + rect.height) as f32 / h,
        }
    }

    /// Swap the left and right edges.
    pub fn flip_horizontal(&self) -> Self {
        Self {
            u_min: self.u_max,
            v_min: self.v_min,
            u_max: self.u_min,
            v_max: self.v_max,
        }
    }

    /// Swap the top and bottom edges.
    pub fn flip_vertical(&self) -> Self {
        Self {
            u_min: self.u_min,
            v_min: self.v_max,
            u_max: self.u_max,
            v_max: self.v_min,
        }
    }

    pub fn with_effects(self, effects: SpriteEffects) -> Self {
        let mut uv = self;
        if effects.contains(SpriteEffects::FLIP_VERTICALLY) {
            uv = uv.flip_vertical();
        }
        if effects.contains(SpriteEffects::FLIP_HORIZONTALLY) {
            uv = uv.flip_horizontal();
        }
        uv
    }

    /// Top-left and bottom-right corners.
    pub fn as_arrays(&self) -> ([f32; 2], [f32; 2]) {
        ([self.u_min, self.v_min], [self.u_max, self.v_max])
    }
}

/// A texture as the sprite batch sees it.
///
/// Loading and uploading texture data happens elsewhere; the batch only
/// needs something to bind and the pixel size to normalize source rects.
#[derive(Debug, Clone)]
pub struct SpriteTexture {
    pub id: u64,
    pub view: GpuTextureView,
    pub sampler: GpuSampler,
    pub width: u32,
    pub height: u32,
}

impl SpriteTexture {
    pub fn new(id: u64, view: GpuTextureView, sampler: GpuSampler, width: u32, height: u32) -> Self {
        Self {
            id,
            view,
            sampler,
            width,
            height,
        }
    }

    pub(crate) fn image_descriptor(&self) -> ImageDescriptor {
        ImageDescriptor {
            view: self.view.clone(),
            sampler: self.sampler.clone(),
            layout: ImageLayout::ShaderReadOnlyOptimal,
        }
    }
}

/// Parameters of a single sprite draw.
///
/// ```
/// use glam::Vec2;
/// use starfall_render::{Color, SpriteDraw, SpriteEffects};
///
/// let draw = SpriteDraw::at(Vec2::new(10.0, 20.0))
///     .color(Color::WHITE)
///     .effects(SpriteEffects::FLIP_HORIZONTALLY)
///     .depth(0.25);
/// assert_eq!(draw.scale, 1.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteDraw {
    /// Destination of the sprite origin, in pixels.
    pub position: Vec2,
    /// Region of the texture to draw; the whole texture when `None`.
    pub source_rect: Option<SourceRect>,
    pub color: Color,
    /// Rotation in radians around `origin`.
    pub rotation: f32,
    /// Pivot in pixels, relative to the top-left of the region.
    pub origin: Vec2,
    /// Uniform scale.
    pub scale: f32,
    pub effects: SpriteEffects,
    /// Layer depth in `0.0..=1.0`, smaller is further away.
    ///
    /// Depth 0 lands on the far plane and fails the `Less` depth test
    /// against a cleared depth of 1.
    pub depth: f32,
}

impl Default for SpriteDraw {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            source_rect: None,
            color: Color::WHITE,
            rotation: 0.0,
            origin: Vec2::ZERO,
            scale: 1.0,
            effects: SpriteEffects::empty(),
            depth: 0.5,
        }
    }
}

impl SpriteDraw {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn source_rect(mut self, rect: SourceRect) -> Self {
        self.source_rect = Some(rect);
        self
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn rotation(mut self, radians: f32) -> Self {
        self.rotation = radians;
        self
    }

    pub fn origin(mut self, origin: Vec2) -> Self {
        self.origin = origin;
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn effects(mut self, effects: SpriteEffects) -> Self {
        self.effects = effects;
        self
    }

    pub fn depth(mut self, depth: f32) -> Self {
        self.depth = depth;
        self
    }

    /// `translate(position, depth) * rotate(identity) * scale`.
    ///
    /// Rotation travels in the vertex data as (sin, cos), so the matrix
    /// carries none.
    pub fn world_transform(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(self.position.x, self.position.y, self.depth))
            * Mat4::IDENTITY
            * Mat4::from_scale(Vec3::splat(self.scale))
    }
}

/// One GPU vertex: sprite-local position and texture coordinate.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpriteVertex {
    pub position: [f32; 3],
    pub tex_coord: [f32; 2],
}

static_assertions::const_assert_eq!(std::mem::size_of::<SpriteVertex>(), 20);

impl SpriteVertex {
    pub const QUAD_VERTICES: u32 = 4;

    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

    /// Per-vertex buffer layout (binding 0).
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SpriteVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Per-instance material index (binding 1).
pub const INSTANCE_STRIDE: u64 = std::mem::size_of::<u32>() as u64;

const INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Uint32];

pub fn instance_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: INSTANCE_STRIDE,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &INSTANCE_ATTRIBUTES,
    }
}

/// Per-quad geometry recorded by `draw`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteVertexItem {
    pub x: f32,
    pub y: f32,
    pub depth: f32,
    /// Negated origin.
    pub origin_x: f32,
    pub origin_y: f32,
    /// Size of the drawn region in texels, before scaling.
    pub width: f32,
    pub height: f32,
    pub sin: f32,
    pub cos: f32,
    /// RGBA8, see [`Color::to_packed`].
    pub color: u32,
    pub tex_tl: [f32; 2],
    pub tex_br: [f32; 2],
}

impl SpriteVertexItem {
    /// Expand into four vertices in top-left, top-right, bottom-left,
    /// bottom-right order.
    ///
    /// Positions are sprite-local (origin at the pivot, rotated); the material
    /// transform places them in the world.
    pub fn corners(&self) -> [SpriteVertex; 4] {
        let [u0, v0] = self.tex_tl;
        let [u1, v1] = self.tex_br;
        let corner = |cx: f32, cy: f32, u: f32, v: f32| {
            let px = cx * self.width + self.origin_x;
            let py = cy * self.height + self.origin_y;
            SpriteVertex {
                position: [px * self.cos - py * self.sin, px * self.sin + py * self.cos, 0.0],
                tex_coord: [u, v],
            }
        };
        [
            corner(0.0, 0.0, u0, v0),
            corner(1.0, 0.0, u1, v0),
            corner(0.0, 1.0, u0, v1),
            corner(1.0, 1.0, u1, v1),
        ]
    }
}

/// Per-quad shading data, read from the storage buffer by instance index.
///
/// Layout matches the WGSL `SpriteMaterial` struct: the matrix is 16-byte
/// aligned, hence the padding.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpriteMaterialData {
    /// Index into the bound texture array.
    pub texture: u32,
    /// RGBA8 tint.
    pub color: u32,
    pub _padding: [u32; 2],
    /// Model-view-projection, column major.
    pub transform: [[f32; 4]; 4],
}

static_assertions::const_assert_eq!(std::mem::size_of::<SpriteMaterialData>(), 80);

impl SpriteMaterialData {
    pub fn new(texture: u32, color: Color, transform: Mat4) -> Self {
        Self {
            texture,
            color: color.to_packed(),
            _padding: [0; 2],
            transform: transform.to_cols_array_2d(),
        }
    }

    pub fn transform(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uv_from_source() {
        let uv = SpriteUV::from_source(SourceRect::new(16, 0, 16, 32), 64, 32);
        assert_eq!(uv, SpriteUV::new(0.25, 0.0, 0.5, 1.0));
    }

    #[test]
    fn test_flip_is_involution() {
        let uv = SpriteUV::new(0.1, 0.2, 0.3, 0.4);
        for effects in [
            SpriteEffects::FLIP_HORIZONTALLY,
            SpriteEffects::FLIP_VERTICALLY,
            SpriteEffects::all(),
        ] {
            assert_ne!(uv.with_effects(effects), uv);
            assert_eq!(uv.with_effects(effects).with_effects(effects), uv);
        }
        assert_eq!(uv.with_effects(SpriteEffects::empty()), uv);
    }

    #[test]
    fn test_corners_unrotated() {
        let item = SpriteVertexItem {
            x: 10.0,
            y: 20.0,
            depth: 0.5,
            origin_x: -8.0,
            origin_y: -4.0,
            width: 16.0,
            height: 8.0,
            sin: 0.0,
            cos: 1.0,
            color: Color::WHITE.to_packed(),
            tex_tl: [0.0, 0.0],
            tex_br: [1.0, 1.0],
        };
        let corners = item.corners();
        assert_eq!(corners[0].position, [-8.0, -4.0, 0.0]);
        assert_eq!(corners[1].position, [8.0, -4.0, 0.0]);
        assert_eq!(corners[2].position, [-8.0, 4.0, 0.0]);
        assert_eq!(corners[3].position, [8.0, 4.0, 0.0]);
        assert_eq!(corners[1].tex_coord, [1.0, 0.0]);
        assert_eq!(corners[2].tex_coord, [0.0, 1.0]);
    }

    #[test]
    fn test_corners_quarter_turn() {
        let item = SpriteVertexItem {
            x: 0.0,
            y: 0.0,
            depth: 0.0,
            origin_x: 0.0,
            origin_y: 0.0,
            width: 2.0,
            height: 1.0,
            sin: 1.0,
            cos: 0.0,
            color: 0,
            tex_tl: [0.0, 0.0],
            tex_br: [1.0, 1.0],
        };
        // (2, 0) rotates onto (0, 2).
        assert_eq!(item.corners()[1].position, [0.0, 2.0, 0.0]);
    }

    #[test]
    fn test_world_transform_scales_before_translating() {
        let draw = SpriteDraw::at(Vec2::new(10.0, 20.0)).scale(2.0).depth(0.5);
        let p = draw.world_transform().transform_point3(Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(p, Vec3::new(12.0, 22.0, 0.5));
    }

    #[test]
    fn test_material_layout() {
        let material = SpriteMaterialData::new(3, Color::WHITE, Mat4::IDENTITY);
        let bytes = bytemuck::bytes_of(&material);
        assert_eq!(bytes.len(), 80);
        assert_eq!(u32::from_ne_bytes(bytes[0..4].try_into().unwrap()), 3);
        assert_eq!(material.transform(), Mat4::IDENTITY);
    }
}
