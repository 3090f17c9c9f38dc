//! Scene side collaborators of the renderer.
//!
//! The renderer only needs two things from a scene: a way to stamp everything
//! reachable this frame as active, see [`SceneGraph`], and the views to draw it
//! from, see [`RenderView`].

pub mod node;
pub mod view;

pub use node::*;
pub use view::*;
