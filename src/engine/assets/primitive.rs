use crate::engine::rendering::RenderBuffer;
use crate::utils::sizes::{F32_SIZE, U16_SIZE, U32_SIZE, U8_SIZE};
use bitflags::bitflags;
use bon::Builder;
use nalgebra::Vector3;
use std::sync::Arc;

#[repr(u32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DrawMode {
    Points = 0,
    Lines = 1,
    LineLoop = 2,
    LineStrip = 3,
    #[default]
    Triangles = 4,
    TriangleStrip = 5,
    TriangleFan = 6,
}

impl DrawMode {
    pub const fn gl_enum(self) -> u32 {
        self as u32
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Byte = 0x1400,
    UnsignedByte = 0x1401,
    Short = 0x1402,
    UnsignedShort = 0x1403,
    UnsignedInt = 0x1405,
    #[default]
    Float = 0x1406,
}

impl ComponentType {
    pub const fn gl_enum(self) -> u32 {
        self as u32
    }

    pub const fn size(self) -> usize {
        match self {
            ComponentType::Byte | ComponentType::UnsignedByte => U8_SIZE,
            ComponentType::Short | ComponentType::UnsignedShort => U16_SIZE,
            ComponentType::UnsignedInt => U32_SIZE,
            ComponentType::Float => F32_SIZE,
        }
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    UnsignedByte = 0x1401,
    UnsignedShort = 0x1403,
    UnsignedInt = 0x1405,
}

impl IndexType {
    pub const fn gl_enum(self) -> u32 {
        self as u32
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct AttributeMask: u32 {
        const POSITION = 0x0001;
        const NORMAL = 0x0002;
        const TANGENT = 0x0004;
        const TEXCOORD_0 = 0x0008;
        const TEXCOORD_1 = 0x0010;
        const COLOR_0 = 0x0020;
    }
}

/// Vertex attribute meaning. Every semantic has a fixed attribute location shared by all programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeSemantic {
    Position,
    Normal,
    Tangent,
    TexCoord0,
    TexCoord1,
    Color0,
}

impl AttributeSemantic {
    pub const ALL: [AttributeSemantic; 6] = [
        AttributeSemantic::Position,
        AttributeSemantic::Normal,
        AttributeSemantic::Tangent,
        AttributeSemantic::TexCoord0,
        AttributeSemantic::TexCoord1,
        AttributeSemantic::Color0,
    ];

    pub const fn location(self) -> u32 {
        match self {
            AttributeSemantic::Position => 1,
            AttributeSemantic::Normal => 2,
            AttributeSemantic::Tangent => 3,
            AttributeSemantic::TexCoord0 => 4,
            AttributeSemantic::TexCoord1 => 5,
            AttributeSemantic::Color0 => 6,
        }
    }

    pub const fn mask(self) -> AttributeMask {
        match self {
            AttributeSemantic::Position => AttributeMask::POSITION,
            AttributeSemantic::Normal => AttributeMask::NORMAL,
            AttributeSemantic::Tangent => AttributeMask::TANGENT,
            AttributeSemantic::TexCoord0 => AttributeMask::TEXCOORD_0,
            AttributeSemantic::TexCoord1 => AttributeMask::TEXCOORD_1,
            AttributeSemantic::Color0 => AttributeMask::COLOR_0,
        }
    }

    /// Name the attribute is declared with in shader source.
    pub const fn name(self) -> &'static str {
        match self {
            AttributeSemantic::Position => "POSITION",
            AttributeSemantic::Normal => "NORMAL",
            AttributeSemantic::Tangent => "TANGENT",
            AttributeSemantic::TexCoord0 => "TEXCOORD_0",
            AttributeSemantic::TexCoord1 => "TEXCOORD_1",
            AttributeSemantic::Color0 => "COLOR_0",
        }
    }
}

#[derive(Debug, Clone, Builder)]
pub struct PrimitiveAttribute {
    pub semantic: AttributeSemantic,
    pub buffer: Arc<RenderBuffer>,
    pub component_count: u8,
    #[builder(default)]
    pub component_type: ComponentType,
    /// Zero means tightly packed.
    #[builder(default = 0)]
    pub stride: usize,
    #[builder(default = 0)]
    pub byte_offset: usize,
    #[builder(default = false)]
    pub normalized: bool,
}

#[derive(Debug, Clone)]
pub struct IndexBinding {
    pub buffer: Arc<RenderBuffer>,
    pub index_type: IndexType,
    pub byte_offset: usize,
}

/// Bounding box of a primitive in its local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

/// Geometry description a [`RenderPrimitive`](crate::rendering::RenderPrimitive) is built from.
#[derive(Debug, Clone, Builder)]
pub struct Primitive {
    #[builder(default)]
    pub mode: DrawMode,
    pub element_count: u32,
    #[builder(default)]
    pub attributes: Vec<PrimitiveAttribute>,
    pub index: Option<IndexBinding>,
    pub bounds: Option<Bounds>,
}
