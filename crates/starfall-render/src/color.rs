/// An RGBA color with `f32` components in the `0.0..=1.0` range.
///
/// ```
/// use starfall_render::Color;
///
/// let red = Color::rgb(1.0, 0.0, 0.0);
/// let from_hex = Color::from_hex(0xF0F8FF);
/// assert_eq!(from_hex, Color::ALICE_BLUE);
/// assert_eq!(red.to_packed(), 0xFF00_00FF);
/// ```
///
/// Sprites carry colors to the GPU packed as RGBA8 in a single `u32`
/// (red in the lowest byte), see [`Color::to_packed`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
    /// Default clear color of the sprite batch (`#F0F8FF`).
    pub const ALICE_BLUE: Color = Color::rgb(240.0 / 255.0, 248.0 / 255.0, 1.0);
    pub const CORNFLOWER_BLUE: Color = Color::rgb(100.0 / 255.0, 149.0 / 255.0, 237.0 / 255.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create a color from 8-bit RGBA values (0–255 mapped to 0.0–1.0).
    pub fn from_rgba_u8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: a as f32 / 255.0,
        }
    }

    /// Create a color from a 24-bit RGB hex value (e.g. `0xFF8800`).
    pub fn from_hex(hex: u32) -> Self {
        let r = ((hex >> 16) & 0xFF) as u8;
        let g = ((hex >> 8) & 0xFF) as u8;
        let b = (hex & 0xFF) as u8;
        Self::from_rgba_u8(r, g, b, 255)
    }

    /// Pack into RGBA8, red in the lowest byte.
    ///
    /// Components are clamped to `0.0..=1.0` and rounded.
    pub fn to_packed(self) -> u32 {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
        channel(self.r) | (channel(self.g) << 8) | (channel(self.b) << 16) | (channel(self.a) << 24)
    }

    /// Inverse of [`Color::to_packed`].
    pub fn from_packed(packed: u32) -> Self {
        Self::from_rgba_u8(
            (packed & 0xFF) as u8,
            ((packed >> 8) & 0xFF) as u8,
            ((packed >> 16) & 0xFF) as u8,
            (packed >> 24) as u8,
        )
    }

    pub fn to_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r as f64,
            g: self.g as f64,
            b: self.b as f64,
            a: self.a as f64,
        }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<[f32; 4]> for Color {
    fn from(arr: [f32; 4]) -> Self {
        Self::rgba(arr[0], arr[1], arr[2], arr[3])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_channel_order() {
        assert_eq!(Color::WHITE.to_packed(), 0xFFFF_FFFF);
        assert_eq!(Color::rgba(0.0, 0.0, 1.0, 0.0).to_packed(), 0x00FF_0000);
        assert_eq!(Color::rgba(0.0, 1.0, 0.0, 0.0).to_packed(), 0x0000_FF00);
    }

    #[test]
    fn test_packed_clamps() {
        assert_eq!(Color::rgba(2.0, -1.0, 0.0, 1.0).to_packed(), 0xFF00_00FF);
    }

    #[test]
    fn test_from_packed_inverse() {
        let color = Color::from_rgba_u8(12, 34, 56, 78);
        assert_eq!(Color::from_packed(color.to_packed()), color);
    }
}
