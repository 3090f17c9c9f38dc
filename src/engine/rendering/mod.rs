//! The GPU side of the engine.
//!
//! The [`Renderer`] owns every render resource. Buffers are created through it
//! and may still be waiting on their data, primitives and materials are
//! referred to through slot keys, programs and textures are shared through
//! caches. Every frame, [`Renderer::draw_views`] lets the scene mark what is
//! active, then walks the render orders and issues the minimum of state
//! changes needed to draw it.

pub mod backend;
pub mod buffer;
pub mod cache;
mod error;
pub mod material;
pub mod primitive;
pub mod renderer;
pub mod shaders;

pub use buffer::*;
pub use error::*;
pub use material::*;
pub use primitive::*;
pub use renderer::*;
