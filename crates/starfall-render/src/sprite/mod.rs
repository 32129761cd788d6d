//! Sprite batching.
//!
//! [`SpriteBatchEffect`] is the entry point: it loads the pipeline, allocates
//! the descriptor set and owns the [`SpriteBatch`] that sprites are drawn
//! through each frame.

mod batch;
mod effect;
mod page;
mod renderer;
mod types;

pub use batch::{SpriteBatch, SpriteBatchStats};
pub use effect::SpriteBatchEffect;
pub use page::SpriteRenderPage;
pub use renderer::SpriteBatchRenderer;
pub use types::*;
