use crate::engine::assets::{Caps, MaterialState, Texture};
use crate::engine::rendering::RenderPrimitive;
use bon::Builder;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Shader defines, ordered by name so equal sets always produce equal program keys.
pub type ProgramDefines = BTreeMap<String, String>;

pub type DefinesFn = Arc<dyn Fn(&RenderPrimitive) -> ProgramDefines + Send + Sync>;

#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RenderOrder {
    Opaque = 0,
    Sky = 1,
    Transparent = 2,
    Additive = 3,
    /// Picks [`RenderOrder::Transparent`] for blended materials and [`RenderOrder::Opaque`] otherwise.
    #[default]
    Default = 4,
}

impl RenderOrder {
    /// Number of concrete buckets, [`RenderOrder::Default`] is never a bucket.
    pub const BUCKETS: usize = 4;

    pub fn resolve(self, state: MaterialState) -> RenderOrder {
        match self {
            RenderOrder::Default if state.has(Caps::BLEND) => RenderOrder::Transparent,
            RenderOrder::Default => RenderOrder::Opaque,
            order => order,
        }
    }

    pub fn bucket(self) -> Option<usize> {
        match self {
            RenderOrder::Default => None,
            order => Some(order as usize),
        }
    }
}

/// A texture bound to a sampler uniform. The texture unit is the sampler's position in the material.
#[derive(Debug, Clone)]
pub struct MaterialSampler {
    pub uniform_name: String,
    pub texture: Option<Texture>,
}

impl MaterialSampler {
    pub fn new(uniform_name: impl Into<String>, texture: Option<Texture>) -> Self {
        MaterialSampler {
            uniform_name: uniform_name.into(),
            texture,
        }
    }
}

pub type UniformValue = SmallVec<[f32; 4]>;

/// A float vector uniform with one to four components.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialUniform {
    uniform_name: String,
    value: UniformValue,
}

impl MaterialUniform {
    /// Returns `None` unless `value` has between one and four components.
    pub fn new(uniform_name: impl Into<String>, value: &[f32]) -> Option<Self> {
        if !(1..=4).contains(&value.len()) {
            return None;
        }

        Some(MaterialUniform {
            uniform_name: uniform_name.into(),
            value: SmallVec::from_slice(value),
        })
    }

    pub fn scalar(uniform_name: impl Into<String>, value: f32) -> Self {
        Self::from_array(uniform_name, [value])
    }

    pub fn vec2(uniform_name: impl Into<String>, value: [f32; 2]) -> Self {
        Self::from_array(uniform_name, value)
    }

    pub fn vec3(uniform_name: impl Into<String>, value: [f32; 3]) -> Self {
        Self::from_array(uniform_name, value)
    }

    pub fn vec4(uniform_name: impl Into<String>, value: [f32; 4]) -> Self {
        Self::from_array(uniform_name, value)
    }

    fn from_array<const N: usize>(uniform_name: impl Into<String>, value: [f32; N]) -> Self {
        MaterialUniform {
            uniform_name: uniform_name.into(),
            value: SmallVec::from_slice(&value),
        }
    }

    pub fn uniform_name(&self) -> &str {
        &self.uniform_name
    }

    pub fn value(&self) -> &[f32] {
        &self.value
    }
}

#[derive(Clone, Builder)]
pub struct Material {
    #[builder(into)]
    pub name: Option<String>,
    #[builder(into)]
    pub vertex_source: Option<String>,
    #[builder(into)]
    pub fragment_source: Option<String>,
    #[builder(default)]
    pub state: MaterialState,
    #[builder(default)]
    pub samplers: Vec<MaterialSampler>,
    #[builder(default)]
    pub uniforms: Vec<MaterialUniform>,
    #[builder(default)]
    pub render_order: RenderOrder,
    pub defines: Option<DefinesFn>,
}

impl Material {
    pub fn program_defines(&self, primitive: &RenderPrimitive) -> ProgramDefines {
        self.defines
            .as_ref()
            .map(|defines| defines(primitive))
            .unwrap_or_default()
    }
}

impl Debug for Material {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Material")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("samplers", &self.samplers)
            .field("uniforms", &self.uniforms)
            .field("render_order", &self.render_order)
            .field("defines", &self.defines.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_order_follows_blending() {
        let opaque = MaterialState::default();
        let blended = opaque.with_caps(Caps::BLEND);

        assert_eq!(RenderOrder::Default.resolve(opaque), RenderOrder::Opaque);
        assert_eq!(RenderOrder::Default.resolve(blended), RenderOrder::Transparent);
        assert_eq!(RenderOrder::Sky.resolve(blended), RenderOrder::Sky);
        assert_eq!(RenderOrder::Default.bucket(), None);
        assert_eq!(RenderOrder::Additive.bucket(), Some(3));
    }

    #[test]
    fn uniform_arity_is_bounded() {
        assert!(MaterialUniform::new("EMPTY", &[]).is_none());
        assert!(MaterialUniform::new("TOO_BIG", &[0.0; 5]).is_none());

        let color = MaterialUniform::vec4("baseColorFactor", [1.0, 0.5, 0.25, 1.0]);
        assert_eq!(color.value().len(), 4);
        assert_eq!(color.uniform_name(), "baseColorFactor");
    }
}
