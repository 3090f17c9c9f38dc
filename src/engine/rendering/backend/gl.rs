use crate::engine::assets::{BlendFactor, Capability, DepthFunc, DrawMode, IndexType};
use crate::engine::core::Viewport;
use crate::engine::rendering::backend::{
    AttribPointer, BufferHandle, BufferTarget, BufferUsage, GraphicsApi, ProgramHandle,
    ProgramSource, ShaderStage, TexImage, TextureHandle, TextureParameter, UniformLocation,
    VertexArrayHandle,
};
use crate::engine::rendering::error::{BackendError, ProgramLinkErr, ShaderCompileErr};
use glow::HasContext;
use log::warn;
use nalgebra::Matrix4;
use snafu::ensure;

/// [`GraphicsApi`] over an OpenGL (ES) context.
///
/// Native objects are kept in tables and handed out as indices.
pub struct GlowBackend {
    gl: glow::Context,
    buffers: Vec<glow::NativeBuffer>,
    textures: Vec<glow::NativeTexture>,
    programs: Vec<glow::NativeProgram>,
    vertex_arrays: Vec<glow::NativeVertexArray>,
    uniforms: Vec<glow::NativeUniformLocation>,
    high_precision: bool,
}

impl GlowBackend {
    pub fn new(gl: glow::Context) -> Self {
        // SAFETY: the caller hands over a current context
        let high_precision = unsafe {
            gl.get_shader_precision_format(glow::FRAGMENT_SHADER, glow::HIGH_FLOAT)
                .is_some_and(|format| format.precision > 0)
        };

        GlowBackend {
            gl,
            buffers: Vec::new(),
            textures: Vec::new(),
            programs: Vec::new(),
            vertex_arrays: Vec::new(),
            uniforms: Vec::new(),
            high_precision,
        }
    }

    pub fn context(&self) -> &glow::Context {
        &self.gl
    }

    fn buffer(&self, handle: Option<BufferHandle>) -> Option<glow::NativeBuffer> {
        handle.and_then(|h| self.buffers.get(h.0 as usize).copied())
    }

    fn texture(&self, handle: Option<TextureHandle>) -> Option<glow::NativeTexture> {
        handle.and_then(|h| self.textures.get(h.0 as usize).copied())
    }

    fn vertex_array(&self, handle: Option<VertexArrayHandle>) -> Option<glow::NativeVertexArray> {
        handle.and_then(|h| self.vertex_arrays.get(h.0 as usize).copied())
    }

    fn uniform(&self, location: UniformLocation) -> Option<&glow::NativeUniformLocation> {
        self.uniforms.get(location.0 as usize)
    }

    unsafe fn compile(&self, stage: ShaderStage, source: &str) -> Result<glow::NativeShader, BackendError> {
        let gl = &self.gl;
        unsafe {
            let shader = gl.create_shader(stage as u32).map_err(|reason| BackendError::Allocation {
                resource: "shader",
                reason,
            })?;
            gl.shader_source(shader, source);
            gl.compile_shader(shader);

            if !gl.get_shader_compile_status(shader) {
                let log = gl.get_shader_info_log(shader);
                gl.delete_shader(shader);
                return ShaderCompileErr { stage, log }.fail();
            }
            Ok(shader)
        }
    }
}

impl GraphicsApi for GlowBackend {
    fn create_buffer(&mut self) -> Result<BufferHandle, BackendError> {
        // SAFETY: all calls below go to the context owned by this backend
        let buffer = unsafe { self.gl.create_buffer() }.map_err(|reason| BackendError::Allocation {
            resource: "buffer",
            reason,
        })?;
        self.buffers.push(buffer);
        Ok(BufferHandle(self.buffers.len() as u32 - 1))
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferHandle>) {
        let buffer = self.buffer(buffer);
        unsafe { self.gl.bind_buffer(target.gl_enum(), buffer) }
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        unsafe {
            self.gl
                .buffer_data_u8_slice(target.gl_enum(), data, usage.gl_enum())
        }
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        unsafe {
            self.gl
                .buffer_sub_data_u8_slice(target.gl_enum(), offset as i32, data)
        }
    }

    fn create_texture(&mut self) -> Result<TextureHandle, BackendError> {
        let texture = unsafe { self.gl.create_texture() }.map_err(|reason| BackendError::Allocation {
            resource: "texture",
            reason,
        })?;
        self.textures.push(texture);
        Ok(TextureHandle(self.textures.len() as u32 - 1))
    }

    fn active_texture(&mut self, unit: u32) {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) }
    }

    fn bind_texture(&mut self, texture: Option<TextureHandle>) {
        let texture = self.texture(texture);
        unsafe { self.gl.bind_texture(glow::TEXTURE_2D, texture) }
    }

    fn tex_image_2d(&mut self, image: TexImage<'_>) {
        unsafe {
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                image.format.gl_enum() as i32,
                image.width as i32,
                image.height as i32,
                0,
                image.format.gl_enum(),
                image.pixel_type.gl_enum(),
                glow::PixelUnpackData::Slice(image.data),
            )
        }
    }

    fn tex_parameter(&mut self, parameter: TextureParameter, value: u32) {
        unsafe {
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, parameter.gl_enum(), value as i32)
        }
    }

    fn generate_mipmap(&mut self) {
        unsafe { self.gl.generate_mipmap(glow::TEXTURE_2D) }
    }

    fn create_program(&mut self, source: &ProgramSource<'_>) -> Result<ProgramHandle, BackendError> {
        unsafe {
            let vertex = self.compile(ShaderStage::Vertex, source.vertex)?;
            let fragment = match self.compile(ShaderStage::Fragment, source.fragment) {
                Ok(fragment) => fragment,
                Err(e) => {
                    self.gl.delete_shader(vertex);
                    return Err(e);
                }
            };

            let gl = &self.gl;
            let program = gl.create_program().map_err(|reason| BackendError::Allocation {
                resource: "program",
                reason,
            })?;
            gl.attach_shader(program, vertex);
            gl.attach_shader(program, fragment);
            for (location, name) in source.attributes {
                gl.bind_attrib_location(program, *location, name);
            }
            gl.link_program(program);

            gl.detach_shader(program, vertex);
            gl.detach_shader(program, fragment);
            gl.delete_shader(vertex);
            gl.delete_shader(fragment);

            let linked = gl.get_program_link_status(program);
            let log = gl.get_program_info_log(program);
            if !linked {
                gl.delete_program(program);
            }
            ensure!(linked, ProgramLinkErr { log });

            self.programs.push(program);
            Ok(ProgramHandle(self.programs.len() as u32 - 1))
        }
    }

    fn active_uniforms(&mut self, program: ProgramHandle) -> Vec<(String, UniformLocation)> {
        let Some(native) = self.programs.get(program.0 as usize).copied() else {
            warn!("[GL] Uniform query for unknown program {program:?}");
            return Vec::new();
        };

        let mut uniforms = Vec::new();
        unsafe {
            let count = self.gl.get_active_uniforms(native);
            for index in 0..count {
                let Some(active) = self.gl.get_active_uniform(native, index) else {
                    continue;
                };
                let name = active.name.trim_end_matches("[0]").to_string();
                let Some(location) = self.gl.get_uniform_location(native, &name) else {
                    continue;
                };
                self.uniforms.push(location);
                uniforms.push((name, UniformLocation(self.uniforms.len() as u32 - 1)));
            }
        }
        uniforms
    }

    fn use_program(&mut self, program: ProgramHandle) {
        let native = self.programs.get(program.0 as usize).copied();
        unsafe { self.gl.use_program(native) }
    }

    fn uniform_1i(&mut self, location: UniformLocation, value: i32) {
        unsafe { self.gl.uniform_1_i32(self.uniform(location), value) }
    }

    fn uniform_1fv(&mut self, location: UniformLocation, value: &[f32]) {
        unsafe { self.gl.uniform_1_f32_slice(self.uniform(location), value) }
    }

    fn uniform_2fv(&mut self, location: UniformLocation, value: &[f32]) {
        unsafe { self.gl.uniform_2_f32_slice(self.uniform(location), value) }
    }

    fn uniform_3fv(&mut self, location: UniformLocation, value: &[f32]) {
        unsafe { self.gl.uniform_3_f32_slice(self.uniform(location), value) }
    }

    fn uniform_4fv(&mut self, location: UniformLocation, value: &[f32]) {
        unsafe { self.gl.uniform_4_f32_slice(self.uniform(location), value) }
    }

    fn uniform_matrix_4fv(&mut self, location: UniformLocation, value: &Matrix4<f32>) {
        unsafe {
            self.gl
                .uniform_matrix_4_f32_slice(self.uniform(location), false, value.as_slice())
        }
    }

    fn enable(&mut self, capability: Capability) {
        unsafe { self.gl.enable(capability.gl_enum()) }
    }

    fn disable(&mut self, capability: Capability) {
        unsafe { self.gl.disable(capability.gl_enum()) }
    }

    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        unsafe { self.gl.blend_func(src.gl_enum(), dst.gl_enum()) }
    }

    fn depth_func(&mut self, func: DepthFunc) {
        unsafe { self.gl.depth_func(func.gl_enum()) }
    }

    fn color_mask(&mut self, enabled: bool) {
        unsafe { self.gl.color_mask(enabled, enabled, enabled, enabled) }
    }

    fn depth_mask(&mut self, enabled: bool) {
        unsafe { self.gl.depth_mask(enabled) }
    }

    fn stencil_mask(&mut self, enabled: bool) {
        unsafe { self.gl.stencil_mask(if enabled { 0xFF } else { 0x00 }) }
    }

    fn viewport(&mut self, viewport: Viewport) {
        unsafe {
            self.gl
                .viewport(viewport.x, viewport.y, viewport.width, viewport.height)
        }
    }

    fn supports_vertex_arrays(&self) -> bool {
        true
    }

    fn create_vertex_array(&mut self) -> Result<VertexArrayHandle, BackendError> {
        let vertex_array = unsafe { self.gl.create_vertex_array() }.map_err(|reason| {
            BackendError::Allocation {
                resource: "vertex array",
                reason,
            }
        })?;
        self.vertex_arrays.push(vertex_array);
        Ok(VertexArrayHandle(self.vertex_arrays.len() as u32 - 1))
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>) {
        let vertex_array = self.vertex_array(vertex_array);
        unsafe { self.gl.bind_vertex_array(vertex_array) }
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(index) }
    }

    fn disable_vertex_attrib_array(&mut self, index: u32) {
        unsafe { self.gl.disable_vertex_attrib_array(index) }
    }

    fn vertex_attrib_pointer(&mut self, pointer: &AttribPointer) {
        unsafe {
            self.gl.vertex_attrib_pointer_f32(
                pointer.index,
                pointer.component_count as i32,
                pointer.component_type.gl_enum(),
                pointer.normalized,
                pointer.stride as i32,
                pointer.byte_offset as i32,
            )
        }
    }

    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32) {
        unsafe { self.gl.draw_arrays(mode.gl_enum(), first as i32, count as i32) }
    }

    fn draw_elements(&mut self, mode: DrawMode, count: u32, index_type: IndexType, byte_offset: usize) {
        unsafe {
            self.gl.draw_elements(
                mode.gl_enum(),
                count as i32,
                index_type.gl_enum(),
                byte_offset as i32,
            )
        }
    }

    fn fragment_high_precision(&self) -> bool {
        self.high_precision
    }
}
