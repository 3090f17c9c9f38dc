use crate::engine::assets::{Material, ProgramDefines};
use crate::engine::rendering::backend::{GraphicsApi, ProgramHandle, ProgramSource, UniformLocation};
use crate::engine::rendering::error::{
    MissingFragmentSourceErr, MissingMaterialNameErr, MissingVertexSourceErr,
    MultiviewUnsupportedErr, ProgramBuildErr, Result,
};
use crate::engine::rendering::shaders::{
    compose_fragment_source, compose_vertex_source, FloatPrecision, ATTRIBUTE_BINDINGS,
};
use dashmap::DashMap;
use itertools::Itertools;
use log::{debug, trace};
use snafu::{OptionExt, ResultExt, ensure};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// A linked program and the uniforms it declares.
#[derive(Debug)]
pub struct Program {
    key: String,
    handle: ProgramHandle,
    uniforms: HashMap<String, UniformLocation>,
    sampler_units: Vec<(UniformLocation, i32)>,
    samplers_bound: AtomicBool,
}

impl Program {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    pub fn uniform(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms.get(name).copied()
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniforms.contains_key(name)
    }

    pub fn uniforms(&self) -> impl Iterator<Item = (&str, UniformLocation)> {
        self.uniforms.iter().map(|(name, loc)| (name.as_str(), *loc))
    }

    /// Makes the program current. The first use also assigns sampler uniforms to their texture units.
    pub fn use_program<G: GraphicsApi>(&self, gl: &mut G) {
        gl.use_program(self.handle);

        if !self.samplers_bound.swap(true, Ordering::AcqRel) {
            for (location, unit) in &self.sampler_units {
                gl.uniform_1i(*location, *unit);
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProgramOptions {
    pub multiview: bool,
    pub fragment_precision: FloatPrecision,
}

/// Programs keyed by material name and shader defines. Entries live as long as the cache.
#[derive(Debug, Default)]
pub struct ProgramCache {
    data: DashMap<String, Arc<Program>>,
    cache_misses: AtomicUsize,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `name:` followed by `define=value,` for every define in name order.
    pub fn program_key(name: &str, defines: &ProgramDefines) -> String {
        let defines = defines
            .iter()
            .format_with("", |(define, value), f| f(&format_args!("{define}={value},")));
        format!("{name}:{defines}")
    }

    /// Fails on incomplete materials before looking at the cache.
    pub fn validate(material: &Material, options: &ProgramOptions) -> Result<String> {
        let name = material.name.clone().context(MissingMaterialNameErr)?;

        ensure!(
            material.vertex_source.is_some(),
            MissingVertexSourceErr { material: &name }
        );
        ensure!(
            material.fragment_source.is_some(),
            MissingFragmentSourceErr { material: &name }
        );
        ensure!(!options.multiview, MultiviewUnsupportedErr { material: &name });

        Ok(name)
    }

    pub fn get_or_create<G: GraphicsApi>(
        &self,
        gl: &mut G,
        material: &Material,
        defines: &ProgramDefines,
        options: &ProgramOptions,
    ) -> Result<Arc<Program>> {
        let name = Self::validate(material, options)?;
        let key = Self::program_key(&name, defines);

        if let Some(program) = self.data.get(&key) {
            trace!("[Program Cache] Hit for {key:?}");
            return Ok(program.clone());
        }

        let misses = self.cache_misses.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("[Program Cache] Compiling {key:?} (miss #{misses})");

        let program = Arc::new(Self::build(gl, material, &name, key.clone(), defines, options)?);
        Ok(self.data.entry(key).or_insert(program).clone())
    }

    fn build<G: GraphicsApi>(
        gl: &mut G,
        material: &Material,
        name: &str,
        key: String,
        defines: &ProgramDefines,
        options: &ProgramOptions,
    ) -> Result<Program> {
        let vertex = compose_vertex_source(material.vertex_source.as_deref().unwrap_or_default(), defines);
        let fragment = compose_fragment_source(
            material.fragment_source.as_deref().unwrap_or_default(),
            defines,
            options.fragment_precision,
        );

        let handle = gl
            .create_program(&ProgramSource {
                vertex: &vertex,
                fragment: &fragment,
                attributes: &ATTRIBUTE_BINDINGS,
            })
            .context(ProgramBuildErr { material: name })?;

        let uniforms: HashMap<String, UniformLocation> = gl.active_uniforms(handle).into_iter().collect();

        let sampler_units = material
            .samplers
            .iter()
            .enumerate()
            .filter_map(|(unit, sampler)| {
                uniforms
                    .get(&sampler.uniform_name)
                    .map(|loc| (*loc, unit as i32))
            })
            .collect();

        Ok(Program {
            key,
            handle,
            uniforms,
            sampler_units,
            samplers_bound: AtomicBool::new(false),
        })
    }

    pub fn get(&self, key: &str) -> Option<Arc<Program>> {
        self.data.get(key).map(|p| p.clone())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn misses(&self) -> usize {
        self.cache_misses.load(Ordering::Relaxed)
    }
}
