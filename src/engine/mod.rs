pub mod assets;
pub mod core;
pub mod rendering;

pub use self::rendering::{FrameContext, Renderer, RendererConfig};
