//! The immediate-mode graphics API the renderer drives.
//!
//! [`GraphicsApi`] is the complete surface the renderer needs: resource
//! creation, fixed-function state toggles, binds, uniform uploads and draw
//! calls. Resources are referred to through small copyable handles, each backend
//! decides what they map to.
//!
//! [`HeadlessBackend`] records every call and is what the tests run against.
//! With the `glow` feature enabled, `GlowBackend` forwards to a real OpenGL (ES)
//! context.

mod headless;
#[cfg(feature = "glow")]
mod gl;

pub use self::headless::*;
#[cfg(feature = "glow")]
pub use self::gl::*;

use crate::engine::assets::{
    BlendFactor, Capability, ComponentType, DepthFunc, DrawMode, IndexType, PixelFormat,
    PixelType,
};
use crate::engine::core::Viewport;
use crate::engine::rendering::error::BackendError;
use nalgebra::Matrix4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformLocation(pub u32);

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array = 0x8892,
    ElementArray = 0x8893,
}

impl BufferTarget {
    pub const fn gl_enum(self) -> u32 {
        self as u32
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    StreamDraw = 0x88E0,
    #[default]
    StaticDraw = 0x88E4,
    DynamicDraw = 0x88E8,
}

impl BufferUsage {
    pub const fn gl_enum(self) -> u32 {
        self as u32
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Fragment = 0x8B30,
    Vertex = 0x8B31,
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureParameter {
    MagFilter = 0x2800,
    MinFilter = 0x2801,
    WrapS = 0x2802,
    WrapT = 0x2803,
}

impl TextureParameter {
    pub const fn gl_enum(self) -> u32 {
        self as u32
    }
}

/// Complete shader sources plus the attribute locations to bind before linking.
#[derive(Debug, Clone, Copy)]
pub struct ProgramSource<'a> {
    pub vertex: &'a str,
    pub fragment: &'a str,
    pub attributes: &'a [(u32, &'static str)],
}

#[derive(Debug, Clone, Copy)]
pub struct TexImage<'a> {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixel_type: PixelType,
    pub data: Option<&'a [u8]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttribPointer {
    pub index: u32,
    pub component_count: u8,
    pub component_type: ComponentType,
    pub normalized: bool,
    pub stride: usize,
    pub byte_offset: usize,
}

/// Everything the renderer issues against the GPU.
///
/// Texture calls operate on the texture bound to the active unit and the
/// `TEXTURE_2D` target. Calls that cannot fail in the underlying API return
/// nothing, resource creation reports failure through [`BackendError`].
pub trait GraphicsApi {
    fn create_buffer(&mut self) -> Result<BufferHandle, BackendError>;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferHandle>);
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage);
    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]);

    fn create_texture(&mut self) -> Result<TextureHandle, BackendError>;
    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, texture: Option<TextureHandle>);
    fn tex_image_2d(&mut self, image: TexImage<'_>);
    fn tex_parameter(&mut self, parameter: TextureParameter, value: u32);
    fn generate_mipmap(&mut self);

    fn create_program(&mut self, source: &ProgramSource<'_>) -> Result<ProgramHandle, BackendError>;
    /// Uniforms the linked program actually declares.
    fn active_uniforms(&mut self, program: ProgramHandle) -> Vec<(String, UniformLocation)>;
    fn use_program(&mut self, program: ProgramHandle);

    fn uniform_1i(&mut self, location: UniformLocation, value: i32);
    fn uniform_1fv(&mut self, location: UniformLocation, value: &[f32]);
    fn uniform_2fv(&mut self, location: UniformLocation, value: &[f32]);
    fn uniform_3fv(&mut self, location: UniformLocation, value: &[f32]);
    fn uniform_4fv(&mut self, location: UniformLocation, value: &[f32]);
    fn uniform_matrix_4fv(&mut self, location: UniformLocation, value: &Matrix4<f32>);

    fn enable(&mut self, capability: Capability);
    fn disable(&mut self, capability: Capability);
    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor);
    fn depth_func(&mut self, func: DepthFunc);
    fn color_mask(&mut self, enabled: bool);
    fn depth_mask(&mut self, enabled: bool);
    fn stencil_mask(&mut self, enabled: bool);
    fn viewport(&mut self, viewport: Viewport);

    fn supports_vertex_arrays(&self) -> bool;
    fn create_vertex_array(&mut self) -> Result<VertexArrayHandle, BackendError>;
    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>);
    fn enable_vertex_attrib_array(&mut self, index: u32);
    fn disable_vertex_attrib_array(&mut self, index: u32);
    fn vertex_attrib_pointer(&mut self, pointer: &AttribPointer);

    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32);
    fn draw_elements(&mut self, mode: DrawMode, count: u32, index_type: IndexType, byte_offset: usize);

    /// Whether fragment shaders support `highp` floats.
    fn fragment_high_precision(&self) -> bool;
}
