use crate::engine::assets::{
    AttributeMask, AttributeSemantic, Material, MaterialState, Primitive, RenderOrder, StateChange,
    Texture, compute_state_delta,
};
use crate::engine::core::{Node, NodeId, RenderView, SceneGraph};
use crate::engine::rendering::backend::{AttribPointer, BufferTarget, BufferUsage, GraphicsApi};
use crate::engine::rendering::buffer::{BufferSource, RenderBuffer};
use crate::engine::rendering::cache::{Program, ProgramCache, ProgramOptions, TextureCache};
use crate::engine::rendering::error::{BackendErr, Result, UnknownMaterialErr, UnknownPrimitiveErr};
use crate::engine::rendering::material::RenderMaterial;
use crate::engine::rendering::primitive::{ActiveMarker, MaterialKey, PrimitiveKey, RenderPrimitive};
use crate::engine::rendering::shaders::{
    CAMERA_POSITION, EYE_INDEX, FloatPrecision, LIGHT_COLOR, LIGHT_DIRECTION1, LIGHT_DIRECTION2,
    MODEL_MATRIX, PROJECTION_MATRIX, VIEW_MATRIX,
};
use crate::utils::FrameCounter;
use bon::Builder;
use futures::channel::oneshot;
use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, error, trace, warn};
use nalgebra::{Point3, Vector3};
use slotmap::SlotMap;
use snafu::{OptionExt, ResultExt};
use std::sync::Arc;

fn default_light_color() -> Vector3<f32> {
    Vector3::new(10.0, 10.0, 10.0)
}

fn default_light_direction1() -> Vector3<f32> {
    Vector3::new(-0.1, -1.0, 1.0)
}

fn default_light_direction2() -> Vector3<f32> {
    Vector3::new(0.0, -2.5, 0.0)
}

#[derive(Debug, Clone, Builder)]
pub struct RendererConfig {
    #[builder(default = default_light_color())]
    pub light_color: Vector3<f32>,
    #[builder(default = default_light_direction1())]
    pub light_direction1: Vector3<f32>,
    #[builder(default = default_light_direction2())]
    pub light_direction2: Vector3<f32>,
    /// Not supported yet. Every program lookup fails while this is set.
    #[builder(default = false)]
    pub multiview: bool,
    /// Vertex array objects are only used if the backend supports them as well.
    #[builder(default = true)]
    pub use_vertex_arrays: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        RendererConfig::builder().build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub frame_id: u64,
    pub time: f64,
}

/// A secondary pass drawn after all render orders, with whatever state the core pass left behind.
pub trait DrawExtension<G: GraphicsApi> {
    fn draw(&mut self, gl: &mut G, views: &[RenderView], frame: &FrameInfo);
}

/// Everything a single [`Renderer::draw_views`] call needs besides the scene.
pub struct FrameContext<'a, G: GraphicsApi> {
    /// Seconds, monotonic.
    pub time: f64,
    extensions: Vec<&'a mut dyn DrawExtension<G>>,
}

impl<'a, G: GraphicsApi> FrameContext<'a, G> {
    pub fn new(time: f64) -> Self {
        FrameContext {
            time,
            extensions: Vec::new(),
        }
    }

    pub fn with_extension(mut self, extension: &'a mut dyn DrawExtension<G>) -> Self {
        self.extensions.push(extension);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame_id: u64,
    pub draw_calls: usize,
    pub program_switches: usize,
    pub material_binds: usize,
    pub state_changes: usize,
    pub vertex_arrays_created: usize,
    /// Primitives sitting in a bucket that were not active this frame.
    pub skipped_primitives: usize,
}

struct PendingBuffer {
    buffer: Arc<RenderBuffer>,
    source: BoxFuture<'static, Option<Vec<u8>>>,
    ready: oneshot::Sender<()>,
}

struct DeferredUpdate {
    buffer: Arc<RenderBuffer>,
    data: Vec<u8>,
    offset: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct MaskResets {
    color: bool,
    depth: bool,
    stencil: bool,
}

#[derive(Debug, Clone, Copy)]
struct Lights {
    color: Vector3<f32>,
    direction1: Vector3<f32>,
    direction2: Vector3<f32>,
}

pub struct Renderer<G: GraphicsApi> {
    gl: G,
    config: RendererConfig,
    lights: Lights,
    frame_id: u64,

    programs: ProgramCache,
    textures: TextureCache,
    primitives: SlotMap<PrimitiveKey, RenderPrimitive>,
    materials: SlotMap<MaterialKey, RenderMaterial>,
    buckets: [Vec<PrimitiveKey>; RenderOrder::BUCKETS],

    pending_buffers: Vec<PendingBuffer>,
    deferred_updates: Vec<DeferredUpdate>,

    camera_positions: Vec<Point3<f32>>,
    fragment_precision: FloatPrecision,
    vertex_arrays: bool,
    mask_resets: MaskResets,

    frame_counter: FrameCounter,
    last_stats: FrameStats,
}

impl<G: GraphicsApi> Renderer<G> {
    pub fn new(gl: G, config: RendererConfig) -> Self {
        let fragment_precision = if gl.fragment_high_precision() {
            FloatPrecision::High
        } else {
            FloatPrecision::Medium
        };
        let vertex_arrays = config.use_vertex_arrays && gl.supports_vertex_arrays();
        if config.use_vertex_arrays && !vertex_arrays {
            debug!("[Renderer] Vertex arrays unavailable, binding attributes per primitive");
        }

        Renderer {
            gl,
            lights: Lights {
                color: config.light_color,
                direction1: config.light_direction1,
                direction2: config.light_direction2,
            },
            config,
            frame_id: 0,
            programs: ProgramCache::new(),
            textures: TextureCache::new(),
            primitives: SlotMap::with_key(),
            materials: SlotMap::with_key(),
            buckets: Default::default(),
            pending_buffers: Vec::new(),
            deferred_updates: Vec::new(),
            camera_positions: Vec::new(),
            fragment_precision,
            vertex_arrays,
            mask_resets: MaskResets::default(),
            frame_counter: FrameCounter::default(),
            last_stats: FrameStats::default(),
        }
    }

    pub fn gl(&self) -> &G {
        &self.gl
    }

    pub fn gl_mut(&mut self) -> &mut G {
        &mut self.gl
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Id of the last frame drawn. Zero before the first frame.
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn last_frame_stats(&self) -> &FrameStats {
        &self.last_stats
    }

    pub fn frame_counter(&self) -> &FrameCounter {
        &self.frame_counter
    }

    pub fn program_cache(&self) -> &ProgramCache {
        &self.programs
    }

    pub fn texture_cache(&self) -> &TextureCache {
        &self.textures
    }

    pub fn uses_vertex_arrays(&self) -> bool {
        self.vertex_arrays
    }

    pub fn global_light_color(&self) -> Vector3<f32> {
        self.lights.color
    }

    pub fn set_global_light_color(&mut self, color: Vector3<f32>) {
        self.lights.color = color;
    }

    pub fn global_light_direction1(&self) -> Vector3<f32> {
        self.lights.direction1
    }

    pub fn set_global_light_direction1(&mut self, direction: Vector3<f32>) {
        self.lights.direction1 = direction;
    }

    pub fn global_light_direction2(&self) -> Vector3<f32> {
        self.lights.direction2
    }

    pub fn set_global_light_direction2(&mut self, direction: Vector3<f32>) {
        self.lights.direction2 = direction;
    }

    pub fn create_render_buffer(
        &mut self,
        target: BufferTarget,
        source: BufferSource,
    ) -> Result<Arc<RenderBuffer>> {
        self.create_render_buffer_with_usage(target, source, BufferUsage::StaticDraw)
    }

    /// Immediate data is uploaded right away. Pending data is uploaded by the first
    /// [`poll_uploads`](Self::poll_uploads) after it arrives.
    pub fn create_render_buffer_with_usage(
        &mut self,
        target: BufferTarget,
        source: BufferSource,
        usage: BufferUsage,
    ) -> Result<Arc<RenderBuffer>> {
        let (buffer, ready) = RenderBuffer::new(target, usage);
        let buffer = Arc::new(buffer);

        match source {
            BufferSource::Immediate(data) => {
                let handle = self.gl.create_buffer().context(BackendErr)?;
                self.gl.bind_buffer(target, Some(handle));
                self.gl.buffer_data(target, &data, usage);
                buffer.resolve(handle, data.len(), ready);
                trace!("[Renderer] Uploaded buffer {} ({} bytes)", buffer.id(), data.len());
            }
            BufferSource::Pending(source) => {
                self.pending_buffers.push(PendingBuffer {
                    buffer: buffer.clone(),
                    source,
                    ready,
                });
            }
        }

        Ok(buffer)
    }

    /// Writes `data` at `offset`. Updates to buffers without a handle are queued
    /// and applied in order once the buffer resolves.
    pub fn update_render_buffer(&mut self, buffer: &Arc<RenderBuffer>, data: &[u8], offset: usize) {
        if buffer.is_ready() {
            Self::write_buffer(&mut self.gl, buffer, data, offset);
        } else {
            self.deferred_updates.push(DeferredUpdate {
                buffer: buffer.clone(),
                data: data.to_vec(),
                offset,
            });
        }
    }

    fn write_buffer(gl: &mut G, buffer: &RenderBuffer, data: &[u8], offset: usize) {
        let target = buffer.target();
        gl.bind_buffer(target, buffer.handle());
        if offset == 0 && buffer.len() == data.len() {
            gl.buffer_data(target, data, buffer.usage());
        } else {
            gl.buffer_sub_data(target, offset, data);
        }
    }

    /// Uploads arrived buffer data, applies queued updates and uploads arrived images.
    ///
    /// Runs at the start of every [`draw_views`](Self::draw_views).
    pub fn poll_uploads(&mut self) {
        for mut pending in std::mem::take(&mut self.pending_buffers) {
            match (&mut pending.source).now_or_never() {
                None => self.pending_buffers.push(pending),
                Some(None) => {
                    warn!("[Renderer] Data for buffer {} never arrived", pending.buffer.id());
                }
                Some(Some(data)) => match self.gl.create_buffer() {
                    Ok(handle) => {
                        let target = pending.buffer.target();
                        self.gl.bind_buffer(target, Some(handle));
                        self.gl.buffer_data(target, &data, pending.buffer.usage());
                        pending.buffer.resolve(handle, data.len(), pending.ready);
                        trace!(
                            "[Renderer] Uploaded deferred buffer {} ({} bytes)",
                            pending.buffer.id(),
                            data.len()
                        );
                    }
                    Err(e) => error!("[Renderer] Could not create buffer {}: {e}", pending.buffer.id()),
                },
            }
        }

        for update in std::mem::take(&mut self.deferred_updates) {
            if update.buffer.is_ready() {
                Self::write_buffer(&mut self.gl, &update.buffer, &update.data, update.offset);
            } else if let Some(Err(_)) = update.buffer.wait_for_complete().now_or_never() {
                warn!(
                    "[Renderer] Dropping update of buffer {}, it will never be ready",
                    update.buffer.id()
                );
            } else {
                self.deferred_updates.push(update);
            }
        }

        let completed = self.textures.poll_pending(&mut self.gl);
        if completed > 0 {
            trace!("[Renderer] {completed} texture(s) completed");
        }
    }

    /// Creates the render side of `primitive` and `material` and files it under the material's render order.
    pub fn create_render_primitive(&mut self, primitive: &Primitive, material: &Material) -> Result<PrimitiveKey> {
        let key = self.primitives.insert(RenderPrimitive::new(primitive));

        let material = match self.create_render_material(material, key) {
            Ok(material) => material,
            Err(e) => {
                self.primitives.remove(key);
                return Err(e);
            }
        };
        self.set_render_material(key, material)?;

        Ok(key)
    }

    /// Compiles or reuses the program for `material` with the defines it derives from `primitive`.
    ///
    /// The material is not attached to anything, see [`set_render_material`](Self::set_render_material).
    pub fn create_render_material(&mut self, material: &Material, primitive: PrimitiveKey) -> Result<MaterialKey> {
        let render_primitive = self.primitives.get(primitive).context(UnknownPrimitiveErr)?;
        let defines = material.program_defines(render_primitive);
        let options = ProgramOptions {
            multiview: self.config.multiview,
            fragment_precision: self.fragment_precision,
        };

        let program = self.programs.get_or_create(&mut self.gl, material, &defines, &options)?;
        let render_material = RenderMaterial::new(&mut self.gl, &mut self.textures, material, program)?;

        Ok(self.materials.insert(render_material))
    }

    /// Swaps the material of a primitive and moves it to the matching render order.
    pub fn set_render_material(&mut self, primitive: PrimitiveKey, material: MaterialKey) -> Result<()> {
        let order = self.materials.get(material).context(UnknownMaterialErr)?.render_order();
        let render_primitive = self.primitives.get_mut(primitive).context(UnknownPrimitiveErr)?;
        render_primitive.set_material(Some(material));

        for bucket in &mut self.buckets {
            bucket.retain(|key| *key != primitive);
        }
        if let Some(bucket) = order.bucket() {
            self.buckets[bucket].push(primitive);
        }
        Ok(())
    }

    pub fn set_primitive_geometry(&mut self, primitive: PrimitiveKey, geometry: &Primitive) -> Result<()> {
        self.primitives
            .get_mut(primitive)
            .context(UnknownPrimitiveErr)?
            .set_geometry(geometry);
        Ok(())
    }

    /// A node holding a single new render primitive.
    pub fn create_mesh(&mut self, primitive: &Primitive, material: &Material) -> Result<Node> {
        let mut node = Node::new(material.name.as_deref().unwrap_or("Mesh"));
        node.add_render_primitive(self.create_render_primitive(primitive, material)?);
        Ok(node)
    }

    /// Drops the primitive. Its material goes with it unless another primitive still uses it.
    pub fn remove_render_primitive(&mut self, primitive: PrimitiveKey) -> bool {
        let Some(removed) = self.primitives.remove(primitive) else {
            return false;
        };
        for bucket in &mut self.buckets {
            bucket.retain(|key| *key != primitive);
        }

        if let Some(material) = removed.material() {
            let shared = self.primitives.values().any(|p| p.material() == Some(material));
            if !shared {
                self.materials.remove(material);
            }
        }
        true
    }

    pub fn remove_instance(&mut self, primitive: PrimitiveKey, node: NodeId) -> bool {
        self.primitives
            .get_mut(primitive)
            .is_some_and(|p| p.remove_instance(node))
    }

    pub fn primitive(&self, primitive: PrimitiveKey) -> Option<&RenderPrimitive> {
        self.primitives.get(primitive)
    }

    pub fn primitive_mut(&mut self, primitive: PrimitiveKey) -> Option<&mut RenderPrimitive> {
        self.primitives.get_mut(primitive)
    }

    pub fn material(&self, material: MaterialKey) -> Option<&RenderMaterial> {
        self.materials.get(material)
    }

    pub fn material_mut(&mut self, material: MaterialKey) -> Option<&mut RenderMaterial> {
        self.materials.get_mut(material)
    }

    pub fn set_material_uniform(&mut self, material: MaterialKey, name: &str, value: &[f32]) -> Result<bool> {
        Ok(self
            .materials
            .get_mut(material)
            .context(UnknownMaterialErr)?
            .set_uniform(name, value))
    }

    /// Points a sampler at another texture, going through the texture cache.
    pub fn set_material_texture(
        &mut self,
        material: MaterialKey,
        name: &str,
        texture: Option<&Texture>,
    ) -> Result<bool> {
        let render_material = self.materials.get_mut(material).context(UnknownMaterialErr)?;
        let texture = self.textures.get_or_create(&mut self.gl, texture)?;
        Ok(render_material.set_sampler_texture(name, texture))
    }

    /// Primitive keys per render order, in draw order.
    pub fn render_order_bucket(&self, order: RenderOrder) -> &[PrimitiveKey] {
        match order.bucket() {
            Some(bucket) => &self.buckets[bucket],
            None => &[],
        }
    }

    /// Draws everything `root` marks active from each of `views`.
    ///
    /// Without a root only pending uploads are processed.
    pub fn draw_views(
        &mut self,
        views: &[RenderView],
        root: Option<&mut dyn SceneGraph>,
        ctx: &mut FrameContext<'_, G>,
    ) {
        self.poll_uploads();

        let Some(root) = root else {
            return;
        };

        self.frame_id += 1;
        self.frame_counter.new_frame_at(ctx.time);
        let frame_id = self.frame_id;

        let mut marker = ActiveMarker::new(frame_id, &mut self.primitives, &mut self.materials);
        root.mark_active(&mut marker);

        let pruned: usize = self
            .primitives
            .values_mut()
            .map(|primitive| primitive.prune_instances(frame_id))
            .sum();
        if pruned > 0 {
            trace!("[Renderer] Pruned {pruned} stale instance(s)");
        }

        let refreshed = self.textures.refresh_active(&mut self.gl, frame_id);
        if refreshed > 0 {
            trace!("[Renderer] Refreshed {refreshed} video texture(s)");
        }

        if let [view] = views {
            if let Some(viewport) = view.viewport() {
                self.gl.viewport(viewport);
            }
        }

        self.camera_positions.clear();
        self.camera_positions
            .extend(views.iter().map(RenderView::camera_position));

        let mut stats = FrameStats {
            frame_id,
            ..FrameStats::default()
        };

        let Renderer {
            gl,
            lights,
            primitives,
            materials,
            buckets,
            camera_positions,
            vertex_arrays,
            mask_resets,
            ..
        } = self;

        let mut pass = DrawPass {
            gl,
            views,
            camera_positions,
            lights: *lights,
            frame_id,
            vertex_arrays: *vertex_arrays,
            mask_resets,
            stats: &mut stats,
        };
        for bucket in buckets.iter().filter(|bucket| !bucket.is_empty()) {
            pass.draw_bucket(bucket, primitives, materials);
        }

        if self.vertex_arrays {
            self.gl.bind_vertex_array(None);
        }
        self.reset_masks();

        let info = FrameInfo {
            frame_id,
            time: ctx.time,
        };
        for extension in ctx.extensions.iter_mut() {
            extension.draw(&mut self.gl, views, &info);
        }

        trace!(
            "[Renderer] Frame {frame_id}: {} draw calls, {} program switches",
            stats.draw_calls,
            stats.program_switches
        );
        self.last_stats = stats;
    }

    fn reset_masks(&mut self) {
        let resets = std::mem::take(&mut self.mask_resets);
        if resets.depth {
            self.gl.depth_mask(true);
        }
        if resets.color {
            self.gl.color_mask(true);
        }
        if resets.stencil {
            self.gl.stencil_mask(true);
        }
    }
}

struct DrawPass<'a, G: GraphicsApi> {
    gl: &'a mut G,
    views: &'a [RenderView],
    camera_positions: &'a [Point3<f32>],
    lights: Lights,
    frame_id: u64,
    vertex_arrays: bool,
    mask_resets: &'a mut MaskResets,
    stats: &'a mut FrameStats,
}

impl<G: GraphicsApi> DrawPass<'_, G> {
    /// Program, material and attribute tracking start over for every bucket.
    fn draw_bucket(
        &mut self,
        bucket: &[PrimitiveKey],
        primitives: &mut SlotMap<PrimitiveKey, RenderPrimitive>,
        materials: &mut SlotMap<MaterialKey, RenderMaterial>,
    ) {
        let mut current_program = None;
        let mut current_material = None;
        let mut current_state: Option<MaterialState> = None;
        let mut attribute_mask: Option<AttributeMask> = None;

        for key in bucket {
            let Some(primitive) = primitives.get_mut(*key) else {
                continue;
            };
            if primitive.active_frame_id() != self.frame_id {
                self.stats.skipped_primitives += 1;
                continue;
            }
            let Some(material_key) = primitive.material() else {
                continue;
            };
            let Some(material) = materials.get_mut(material_key) else {
                continue;
            };

            let program = material.program().clone();
            if current_program != Some(program.handle()) {
                current_program = Some(program.handle());
                program.use_program(self.gl);
                self.upload_frame_uniforms(&program);
                self.stats.program_switches += 1;
            }

            if current_material != Some(material_key) {
                self.apply_state(current_state, material.state());
                material.bind(self.gl);
                current_material = Some(material_key);
                current_state = Some(material.state());
                self.stats.material_binds += 1;
            }

            if !self.bind_geometry(primitive, &mut attribute_mask) {
                continue;
            }

            let views = self.views;
            for (index, view) in views.iter().enumerate() {
                if views.len() > 1 {
                    if let Some(viewport) = view.viewport() {
                        self.gl.viewport(viewport);
                    }
                    self.upload_view_uniforms(&program, view, index);
                }
                self.draw_instances(&program, primitive);
            }
        }
    }

    fn upload_frame_uniforms(&mut self, program: &Program) {
        let lights = [
            (LIGHT_DIRECTION1, self.lights.direction1),
            (LIGHT_DIRECTION2, self.lights.direction2),
            (LIGHT_COLOR, self.lights.color),
        ];
        for (name, value) in lights {
            if let Some(location) = program.uniform(name) {
                self.gl.uniform_3fv(location, value.as_slice());
            }
        }

        let views = self.views;
        if let [view] = views {
            self.upload_view_uniforms(program, view, 0);
        }
    }

    fn upload_view_uniforms(&mut self, program: &Program, view: &RenderView, index: usize) {
        if let Some(location) = program.uniform(PROJECTION_MATRIX) {
            self.gl.uniform_matrix_4fv(location, view.projection_matrix());
        }
        if let Some(location) = program.uniform(VIEW_MATRIX) {
            self.gl.uniform_matrix_4fv(location, view.view_matrix());
        }
        if let (Some(location), Some(position)) = (
            program.uniform(CAMERA_POSITION),
            self.camera_positions.get(index),
        ) {
            self.gl.uniform_3fv(location, position.coords.as_slice());
        }
        if let Some(location) = program.uniform(EYE_INDEX) {
            self.gl.uniform_1i(location, view.eye_index());
        }
    }

    fn apply_state(&mut self, previous: Option<MaterialState>, next: MaterialState) {
        let delta = compute_state_delta(previous, next);
        self.stats.state_changes += delta.len();

        for change in delta {
            match change {
                StateChange::Enable(capability) => self.gl.enable(capability),
                StateChange::Disable(capability) => self.gl.disable(capability),
                StateChange::ColorMask(enabled) => {
                    self.mask_resets.color = !enabled;
                    self.gl.color_mask(enabled);
                }
                StateChange::DepthMask(enabled) => {
                    self.mask_resets.depth = !enabled;
                    self.gl.depth_mask(enabled);
                }
                StateChange::StencilMask(enabled) => {
                    self.mask_resets.stencil = !enabled;
                    self.gl.stencil_mask(enabled);
                }
                StateChange::BlendFunc(src, dst) => self.gl.blend_func(src, dst),
                StateChange::DepthFunc(func) => self.gl.depth_func(func),
            }
        }
    }

    /// Returns `false` if the primitive cannot be drawn this frame.
    fn bind_geometry(&mut self, primitive: &mut RenderPrimitive, attribute_mask: &mut Option<AttributeMask>) -> bool {
        if !self.vertex_arrays {
            bind_primitive(self.gl, primitive, *attribute_mask);
            *attribute_mask = Some(primitive.attribute_mask());
            return true;
        }

        if let Some(vertex_array) = primitive.vertex_array() {
            self.gl.bind_vertex_array(Some(vertex_array));
            return true;
        }

        match self.gl.create_vertex_array() {
            Ok(vertex_array) => {
                self.gl.bind_vertex_array(Some(vertex_array));
                bind_primitive(self.gl, primitive, None);
                primitive.set_vertex_array(vertex_array);
                self.stats.vertex_arrays_created += 1;
                true
            }
            Err(e) => {
                error!("[Renderer] Could not create a vertex array: {e}");
                false
            }
        }
    }

    fn draw_instances(&mut self, program: &Program, primitive: &RenderPrimitive) {
        let model_location = program.uniform(MODEL_MATRIX);

        for instance in primitive.instances() {
            if instance.active_frame_id != self.frame_id {
                continue;
            }

            if let Some(location) = model_location {
                self.gl.uniform_matrix_4fv(location, &instance.world_matrix);
            }

            match primitive.index_buffer() {
                Some(index) => self.gl.draw_elements(
                    primitive.mode(),
                    primitive.element_count(),
                    index.index_type,
                    index.byte_offset,
                ),
                None => self.gl.draw_arrays(primitive.mode(), 0, primitive.element_count()),
            }
            self.stats.draw_calls += 1;
        }
    }
}

/// Specifies the vertex format of `primitive`. Attribute arrays are only toggled if the mask changed.
fn bind_primitive<G: GraphicsApi>(gl: &mut G, primitive: &RenderPrimitive, previous_mask: Option<AttributeMask>) {
    let mask = primitive.attribute_mask();
    if previous_mask != Some(mask) {
        for semantic in AttributeSemantic::ALL {
            if mask.contains(semantic.mask()) {
                gl.enable_vertex_attrib_array(semantic.location());
            } else {
                gl.disable_vertex_attrib_array(semantic.location());
            }
        }
    }

    for group in primitive.attribute_buffers() {
        gl.bind_buffer(BufferTarget::Array, group.buffer.handle());
        for attribute in &group.attributes {
            gl.vertex_attrib_pointer(&AttribPointer {
                index: attribute.location,
                component_count: attribute.component_count,
                component_type: attribute.component_type,
                normalized: attribute.normalized,
                stride: attribute.stride,
                byte_offset: attribute.byte_offset,
            });
        }
    }

    gl.bind_buffer(
        BufferTarget::ElementArray,
        primitive.index_buffer().and_then(|index| index.buffer.handle()),
    );
}
