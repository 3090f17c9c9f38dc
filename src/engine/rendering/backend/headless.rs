use crate::engine::assets::{
    BlendFactor, Capability, DepthFunc, DrawMode, IndexType, PixelFormat, PixelType,
};
use crate::engine::core::Viewport;
use crate::engine::rendering::backend::{
    AttribPointer, BufferHandle, BufferTarget, BufferUsage, GraphicsApi, ProgramHandle,
    ProgramSource, ShaderStage, TexImage, TextureHandle, TextureParameter, UniformLocation,
    VertexArrayHandle,
};
use crate::engine::rendering::error::{BackendError, ShaderCompileErr};
use nalgebra::Matrix4;
use snafu::ensure;
use std::collections::HashMap;

/// One recorded graphics API call.
#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    CreateBuffer(BufferHandle),
    BindBuffer(BufferTarget, Option<BufferHandle>),
    BufferData {
        target: BufferTarget,
        len: usize,
        usage: BufferUsage,
    },
    BufferSubData {
        target: BufferTarget,
        offset: usize,
        len: usize,
    },
    CreateTexture(TextureHandle),
    ActiveTexture(u32),
    BindTexture(Option<TextureHandle>),
    TexImage2D {
        width: u32,
        height: u32,
        format: PixelFormat,
        pixel_type: PixelType,
    },
    TexParameter(TextureParameter, u32),
    GenerateMipmap,
    CreateProgram(ProgramHandle),
    UseProgram(ProgramHandle),
    Uniform1i(UniformLocation, i32),
    UniformFv {
        arity: u8,
        location: UniformLocation,
        value: Vec<f32>,
    },
    UniformMatrix4(UniformLocation, Matrix4<f32>),
    Enable(Capability),
    Disable(Capability),
    BlendFunc(BlendFactor, BlendFactor),
    DepthFunc(DepthFunc),
    ColorMask(bool),
    DepthMask(bool),
    StencilMask(bool),
    Viewport(Viewport),
    CreateVertexArray(VertexArrayHandle),
    BindVertexArray(Option<VertexArrayHandle>),
    EnableVertexAttribArray(u32),
    DisableVertexAttribArray(u32),
    VertexAttribPointer(AttribPointer),
    DrawArrays {
        mode: DrawMode,
        first: u32,
        count: u32,
    },
    DrawElements {
        mode: DrawMode,
        count: u32,
        index_type: IndexType,
        byte_offset: usize,
    },
}

impl GlCall {
    pub fn is_draw(&self) -> bool {
        matches!(self, GlCall::DrawArrays { .. } | GlCall::DrawElements { .. })
    }

    /// True for fixed-function state toggles (capabilities, blending, depth and masks).
    pub fn is_state_change(&self) -> bool {
        matches!(
            self,
            GlCall::Enable(_)
                | GlCall::Disable(_)
                | GlCall::BlendFunc(..)
                | GlCall::DepthFunc(_)
                | GlCall::ColorMask(_)
                | GlCall::DepthMask(_)
                | GlCall::StencilMask(_)
        )
    }
}

#[derive(Debug, Clone)]
struct HeadlessProgram {
    vertex: String,
    fragment: String,
    uniforms: Vec<(String, UniformLocation)>,
}

/// A graphics API without a GPU. Records calls, tracks buffer contents and
/// reflects uniforms by reading the `uniform` declarations of shader sources.
///
/// Shaders containing an `#error` directive fail to compile.
#[derive(Debug, Clone)]
pub struct HeadlessBackend {
    calls: Vec<GlCall>,
    next_handle: u32,
    next_location: u32,
    programs: HashMap<ProgramHandle, HeadlessProgram>,
    bound_buffers: HashMap<BufferTarget, BufferHandle>,
    buffers: HashMap<BufferHandle, Vec<u8>>,
    vertex_arrays: bool,
    high_precision: bool,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        HeadlessBackend::new()
    }
}

impl HeadlessBackend {
    pub fn new() -> Self {
        HeadlessBackend {
            calls: Vec::new(),
            next_handle: 1,
            next_location: 0,
            programs: HashMap::new(),
            bound_buffers: HashMap::new(),
            buffers: HashMap::new(),
            vertex_arrays: true,
            high_precision: true,
        }
    }

    pub fn without_vertex_arrays(mut self) -> Self {
        self.vertex_arrays = false;
        self
    }

    pub fn with_medium_precision(mut self) -> Self {
        self.high_precision = false;
        self
    }

    pub fn calls(&self) -> &[GlCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<GlCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn count_calls(&self, predicate: impl Fn(&GlCall) -> bool) -> usize {
        self.calls.iter().filter(|call| predicate(call)).count()
    }

    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    /// The complete vertex and fragment source a program was created from.
    pub fn program_sources(&self, program: ProgramHandle) -> Option<(&str, &str)> {
        self.programs
            .get(&program)
            .map(|p| (p.vertex.as_str(), p.fragment.as_str()))
    }

    pub fn uniform_name(&self, location: UniformLocation) -> Option<&str> {
        self.programs
            .values()
            .flat_map(|p| p.uniforms.iter())
            .find(|(_, loc)| *loc == location)
            .map(|(name, _)| name.as_str())
    }

    fn next_handle(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn check_shader(stage: ShaderStage, source: &str) -> Result<(), BackendError> {
        let error = source
            .lines()
            .map(str::trim_start)
            .find(|line| line.to_ascii_lowercase().starts_with("#error"));

        ensure!(
            error.is_none(),
            ShaderCompileErr {
                stage,
                log: error.unwrap_or_default().to_string(),
            }
        );
        Ok(())
    }

    fn record_uniform(&mut self, uniforms: &mut Vec<(String, UniformLocation)>, name: &str) {
        if uniforms.iter().any(|(n, _)| n == name) {
            return;
        }
        let location = UniformLocation(self.next_location);
        self.next_location += 1;
        uniforms.push((name.to_string(), location));
    }
}

/// Names declared by `uniform` statements, in declaration order.
pub(crate) fn declared_uniforms(source: &str) -> Vec<String> {
    let code: String = source
        .lines()
        .map(|line| line.split("//").next().unwrap_or_default())
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");

    let mut names = Vec::new();
    for statement in code.split(';') {
        let statement = statement
            .rsplit(['{', '}'])
            .next()
            .unwrap_or_default()
            .trim();

        let Some(declaration) = statement.strip_prefix("uniform") else {
            continue;
        };
        if !declaration.starts_with(char::is_whitespace) {
            continue;
        }

        let mut tokens = declaration.trim_start().splitn(2, char::is_whitespace);
        let mut ty = tokens.next().unwrap_or_default();
        let mut rest = tokens.next().unwrap_or_default().trim_start();
        if matches!(ty, "lowp" | "mediump" | "highp") {
            let mut tokens = rest.splitn(2, char::is_whitespace);
            ty = tokens.next().unwrap_or_default();
            rest = tokens.next().unwrap_or_default();
        }
        if ty.is_empty() {
            continue;
        }

        for name in rest.split(',') {
            let name = name.split('[').next().unwrap_or_default().trim();
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

impl GraphicsApi for HeadlessBackend {
    fn create_buffer(&mut self) -> Result<BufferHandle, BackendError> {
        let handle = BufferHandle(self.next_handle());
        self.buffers.insert(handle, Vec::new());
        self.calls.push(GlCall::CreateBuffer(handle));
        Ok(handle)
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferHandle>) {
        match buffer {
            Some(buffer) => self.bound_buffers.insert(target, buffer),
            None => self.bound_buffers.remove(&target),
        };
        self.calls.push(GlCall::BindBuffer(target, buffer));
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        if let Some(contents) = self
            .bound_buffers
            .get(&target)
            .and_then(|b| self.buffers.get_mut(b))
        {
            *contents = data.to_vec();
        }
        self.calls.push(GlCall::BufferData {
            target,
            len: data.len(),
            usage,
        });
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        if let Some(contents) = self
            .bound_buffers
            .get(&target)
            .and_then(|b| self.buffers.get_mut(b))
        {
            let end = offset + data.len();
            if contents.len() < end {
                contents.resize(end, 0);
            }
            contents[offset..end].copy_from_slice(data);
        }
        self.calls.push(GlCall::BufferSubData {
            target,
            offset,
            len: data.len(),
        });
    }

    fn create_texture(&mut self) -> Result<TextureHandle, BackendError> {
        let handle = TextureHandle(self.next_handle());
        self.calls.push(GlCall::CreateTexture(handle));
        Ok(handle)
    }

    fn active_texture(&mut self, unit: u32) {
        self.calls.push(GlCall::ActiveTexture(unit));
    }

    fn bind_texture(&mut self, texture: Option<TextureHandle>) {
        self.calls.push(GlCall::BindTexture(texture));
    }

    fn tex_image_2d(&mut self, image: TexImage<'_>) {
        self.calls.push(GlCall::TexImage2D {
            width: image.width,
            height: image.height,
            format: image.format,
            pixel_type: image.pixel_type,
        });
    }

    fn tex_parameter(&mut self, parameter: TextureParameter, value: u32) {
        self.calls.push(GlCall::TexParameter(parameter, value));
    }

    fn generate_mipmap(&mut self) {
        self.calls.push(GlCall::GenerateMipmap);
    }

    fn create_program(&mut self, source: &ProgramSource<'_>) -> Result<ProgramHandle, BackendError> {
        Self::check_shader(ShaderStage::Vertex, source.vertex)?;
        Self::check_shader(ShaderStage::Fragment, source.fragment)?;

        let handle = ProgramHandle(self.next_handle());
        let mut uniforms = Vec::new();
        for name in declared_uniforms(source.vertex)
            .into_iter()
            .chain(declared_uniforms(source.fragment))
        {
            self.record_uniform(&mut uniforms, &name);
        }

        self.programs.insert(
            handle,
            HeadlessProgram {
                vertex: source.vertex.to_string(),
                fragment: source.fragment.to_string(),
                uniforms,
            },
        );
        self.calls.push(GlCall::CreateProgram(handle));
        Ok(handle)
    }

    fn active_uniforms(&mut self, program: ProgramHandle) -> Vec<(String, UniformLocation)> {
        self.programs
            .get(&program)
            .map(|p| p.uniforms.clone())
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.calls.push(GlCall::UseProgram(program));
    }

    fn uniform_1i(&mut self, location: UniformLocation, value: i32) {
        self.calls.push(GlCall::Uniform1i(location, value));
    }

    fn uniform_1fv(&mut self, location: UniformLocation, value: &[f32]) {
        self.calls.push(GlCall::UniformFv {
            arity: 1,
            location,
            value: value.to_vec(),
        });
    }

    fn uniform_2fv(&mut self, location: UniformLocation, value: &[f32]) {
        self.calls.push(GlCall::UniformFv {
            arity: 2,
            location,
            value: value.to_vec(),
        });
    }

    fn uniform_3fv(&mut self, location: UniformLocation, value: &[f32]) {
        self.calls.push(GlCall::UniformFv {
            arity: 3,
            location,
            value: value.to_vec(),
        });
    }

    fn uniform_4fv(&mut self, location: UniformLocation, value: &[f32]) {
        self.calls.push(GlCall::UniformFv {
            arity: 4,
            location,
            value: value.to_vec(),
        });
    }

    fn uniform_matrix_4fv(&mut self, location: UniformLocation, value: &Matrix4<f32>) {
        self.calls.push(GlCall::UniformMatrix4(location, *value));
    }

    fn enable(&mut self, capability: Capability) {
        self.calls.push(GlCall::Enable(capability));
    }

    fn disable(&mut self, capability: Capability) {
        self.calls.push(GlCall::Disable(capability));
    }

    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.calls.push(GlCall::BlendFunc(src, dst));
    }

    fn depth_func(&mut self, func: DepthFunc) {
        self.calls.push(GlCall::DepthFunc(func));
    }

    fn color_mask(&mut self, enabled: bool) {
        self.calls.push(GlCall::ColorMask(enabled));
    }

    fn depth_mask(&mut self, enabled: bool) {
        self.calls.push(GlCall::DepthMask(enabled));
    }

    fn stencil_mask(&mut self, enabled: bool) {
        self.calls.push(GlCall::StencilMask(enabled));
    }

    fn viewport(&mut self, viewport: Viewport) {
        self.calls.push(GlCall::Viewport(viewport));
    }

    fn supports_vertex_arrays(&self) -> bool {
        self.vertex_arrays
    }

    fn create_vertex_array(&mut self) -> Result<VertexArrayHandle, BackendError> {
        let handle = VertexArrayHandle(self.next_handle());
        self.calls.push(GlCall::CreateVertexArray(handle));
        Ok(handle)
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>) {
        self.calls.push(GlCall::BindVertexArray(vertex_array));
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        self.calls.push(GlCall::EnableVertexAttribArray(index));
    }

    fn disable_vertex_attrib_array(&mut self, index: u32) {
        self.calls.push(GlCall::DisableVertexAttribArray(index));
    }

    fn vertex_attrib_pointer(&mut self, pointer: &AttribPointer) {
        self.calls.push(GlCall::VertexAttribPointer(*pointer));
    }

    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32) {
        self.calls.push(GlCall::DrawArrays { mode, first, count });
    }

    fn draw_elements(&mut self, mode: DrawMode, count: u32, index_type: IndexType, byte_offset: usize) {
        self.calls.push(GlCall::DrawElements {
            mode,
            count,
            index_type,
            byte_offset,
        });
    }

    fn fragment_high_precision(&self) -> bool {
        self.high_precision
    }
}
