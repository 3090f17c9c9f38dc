use crate::engine::assets::{Material, MaterialState, RenderOrder, UniformValue};
use crate::engine::rendering::backend::{GraphicsApi, UniformLocation};
use crate::engine::rendering::cache::{Program, RenderTexture, TextureCache};
use crate::engine::rendering::error::Result;
use log::debug;
use smallvec::SmallVec;
use std::sync::Arc;

#[derive(Debug)]
pub struct RenderMaterialSampler {
    uniform_name: String,
    texture: Option<Arc<RenderTexture>>,
    unit: u32,
}

impl RenderMaterialSampler {
    pub fn uniform_name(&self) -> &str {
        &self.uniform_name
    }

    pub fn texture(&self) -> Option<&Arc<RenderTexture>> {
        self.texture.as_ref()
    }

    pub fn unit(&self) -> u32 {
        self.unit
    }
}

#[derive(Debug)]
pub struct RenderMaterialUniform {
    uniform_name: String,
    location: Option<UniformLocation>,
    value: UniformValue,
}

impl RenderMaterialUniform {
    pub fn uniform_name(&self) -> &str {
        &self.uniform_name
    }

    pub fn value(&self) -> &[f32] {
        &self.value
    }
}

/// A [`Material`] bound to its program, with its textures resolved through the texture cache.
#[derive(Debug)]
pub struct RenderMaterial {
    program: Arc<Program>,
    state: MaterialState,
    samplers: Vec<RenderMaterialSampler>,
    uniforms: Vec<RenderMaterialUniform>,
    render_order: RenderOrder,
    first_bind: bool,
    active_frame_id: u64,
    complete_for_active_frame: bool,
}

impl RenderMaterial {
    pub(crate) fn new<G: GraphicsApi>(
        gl: &mut G,
        textures: &mut TextureCache,
        material: &Material,
        program: Arc<Program>,
    ) -> Result<Self> {
        let mut samplers = Vec::with_capacity(material.samplers.len());
        for (unit, sampler) in material.samplers.iter().enumerate() {
            samplers.push(RenderMaterialSampler {
                uniform_name: sampler.uniform_name.clone(),
                texture: textures.get_or_create(gl, sampler.texture.as_ref())?,
                unit: unit as u32,
            });
        }

        let uniforms = material
            .uniforms
            .iter()
            .map(|uniform| RenderMaterialUniform {
                uniform_name: uniform.uniform_name().to_string(),
                location: None,
                value: SmallVec::from_slice(uniform.value()),
            })
            .collect();

        Ok(RenderMaterial {
            program,
            state: material.state,
            samplers,
            uniforms,
            render_order: material.render_order.resolve(material.state),
            first_bind: true,
            active_frame_id: 0,
            complete_for_active_frame: false,
        })
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    pub fn state(&self) -> MaterialState {
        self.state
    }

    /// Never [`RenderOrder::Default`].
    pub fn render_order(&self) -> RenderOrder {
        self.render_order
    }

    pub fn samplers(&self) -> &[RenderMaterialSampler] {
        &self.samplers
    }

    pub fn uniforms(&self) -> &[RenderMaterialUniform] {
        &self.uniforms
    }

    /// Overwrites a uniform value. The component count has to match the original value.
    pub fn set_uniform(&mut self, name: &str, value: &[f32]) -> bool {
        let Some(uniform) = self.uniforms.iter_mut().find(|u| u.uniform_name == name) else {
            return false;
        };
        if uniform.value.len() != value.len() {
            return false;
        }
        uniform.value.copy_from_slice(value);
        true
    }

    pub(crate) fn set_sampler_texture(&mut self, name: &str, texture: Option<Arc<RenderTexture>>) -> bool {
        let Some(sampler) = self.samplers.iter_mut().find(|s| s.uniform_name == name) else {
            return false;
        };
        sampler.texture = texture;
        true
    }

    /// Drops every sampler and uniform the program does not declare.
    fn resolve_locations(&mut self) {
        let program = &self.program;

        self.samplers.retain(|sampler| {
            let declared = program.has_uniform(&sampler.uniform_name);
            if !declared {
                debug!("[Material] {} does not declare sampler {:?}", program.key(), sampler.uniform_name);
            }
            declared
        });

        for uniform in &mut self.uniforms {
            uniform.location = program.uniform(&uniform.uniform_name);
        }
        self.uniforms.retain(|uniform| {
            if uniform.location.is_none() {
                debug!("[Material] {} does not declare uniform {:?}", program.key(), uniform.uniform_name);
            }
            uniform.location.is_some()
        });

        self.first_bind = false;
    }

    /// Binds textures and uploads uniform values. Incomplete textures are bound as no texture.
    pub fn bind<G: GraphicsApi>(&mut self, gl: &mut G) {
        if self.first_bind {
            self.resolve_locations();
        }

        for sampler in &self.samplers {
            gl.active_texture(sampler.unit);
            let texture = sampler
                .texture
                .as_ref()
                .filter(|t| t.is_complete())
                .map(|t| t.handle());
            gl.bind_texture(texture);
        }

        for uniform in &self.uniforms {
            let Some(location) = uniform.location else {
                continue;
            };
            match uniform.value.len() {
                1 => gl.uniform_1fv(location, &uniform.value),
                2 => gl.uniform_2fv(location, &uniform.value),
                3 => gl.uniform_3fv(location, &uniform.value),
                4 => gl.uniform_4fv(location, &uniform.value),
                _ => {}
            }
        }
    }

    /// Stamps the material and its textures for `frame_id`.
    ///
    /// Returns whether every referenced texture is complete. Evaluated once per frame.
    pub fn mark_active(&mut self, frame_id: u64) -> bool {
        if self.active_frame_id != frame_id {
            self.active_frame_id = frame_id;
            self.complete_for_active_frame = true;

            for texture in self.samplers.iter().filter_map(|s| s.texture.as_ref()) {
                if !texture.is_complete() {
                    self.complete_for_active_frame = false;
                    break;
                }
                texture.mark_active(frame_id);
            }
        }
        self.complete_for_active_frame
    }

    pub fn active_frame_id(&self) -> u64 {
        self.active_frame_id
    }
}
