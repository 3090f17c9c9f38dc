//! CPU side descriptions of what should be drawn.
//!
//! Nothing in here touches the graphics API. A [`Primitive`] describes geometry
//! living in [`RenderBuffer`](crate::rendering::RenderBuffer)s, a [`Material`]
//! describes how it is shaded and a [`Texture`] describes where pixels come from.
//! The [`Renderer`](crate::Renderer) turns these into their render counterparts.
//!
//! ```rust
//! use prism::assets::{BlendFactor, Caps, Material, MaterialState, MaterialUniform};
//!
//! let glass = Material::builder()
//!     .name("glass")
//!     .vertex_source("vec4 vertex_main(mat4 p, mat4 v, mat4 m) { return p * v * m * vec4(POSITION, 1.0); }")
//!     .fragment_source("uniform vec4 tint; vec4 fragment_main() { return tint; }")
//!     .state(
//!         MaterialState::default()
//!             .with_caps(Caps::BLEND)
//!             .with_blend_func(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha),
//!     )
//!     .uniforms(vec![MaterialUniform::vec4("tint", [0.2, 0.4, 1.0, 0.5])])
//!     .build();
//!
//! assert!(glass.state.blend());
//! ```

mod material;
mod primitive;
mod state;
mod texture;

pub use self::material::*;
pub use self::primitive::*;
pub use self::state::*;
pub use self::texture::*;
