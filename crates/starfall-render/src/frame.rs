use starfall_test_utils::{RenderArea, RenderPassInfo, Viewport};

/// Per-swapchain information the sprite batch is bound against.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInfo {
    pub viewport: Viewport,
    pub scissor: RenderArea,
    pub render_pass: RenderPassInfo,
}

impl FrameInfo {
    /// Full-target viewport and scissor of `width` x `height` pixels.
    pub fn new(width: u32, height: u32, render_pass: RenderPassInfo) -> Self {
        Self {
            viewport: Viewport::new(width as f32, height as f32),
            scissor: RenderArea::new(width, height),
            render_pass,
        }
    }
}
