use crate::engine::assets::{AttributeMask, Bounds, ComponentType, DrawMode, IndexType, Primitive};
use crate::engine::core::NodeId;
use crate::engine::rendering::buffer::RenderBuffer;
use crate::engine::rendering::error::{MissingMaterialErr, Result};
use crate::engine::rendering::material::RenderMaterial;
use crate::engine::rendering::backend::VertexArrayHandle;
use futures::future::{BoxFuture, Shared, join_all};
use futures::FutureExt;
use log::trace;
use nalgebra::Matrix4;
use slotmap::{SlotMap, new_key_type};
use snafu::OptionExt;
use std::sync::Arc;

new_key_type! {
    pub struct PrimitiveKey;
    pub struct MaterialKey;
}

/// Resolves to `true` once every buffer of a primitive has a GPU handle,
/// `false` if one of them will never get one.
pub type Completion = Shared<BoxFuture<'static, bool>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderPrimitiveAttribute {
    pub location: u32,
    pub component_count: u8,
    pub component_type: ComponentType,
    pub stride: usize,
    pub byte_offset: usize,
    pub normalized: bool,
}

/// Attributes sourced from one buffer, in the order they were declared.
#[derive(Debug, Clone)]
pub struct AttributeBuffer {
    pub buffer: Arc<RenderBuffer>,
    pub attributes: Vec<RenderPrimitiveAttribute>,
}

#[derive(Debug, Clone)]
pub struct IndexBuffer {
    pub buffer: Arc<RenderBuffer>,
    pub index_type: IndexType,
    pub byte_offset: usize,
}

/// One placement of a primitive in the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub node: NodeId,
    pub world_matrix: Matrix4<f32>,
    pub active_frame_id: u64,
}

pub struct RenderPrimitive {
    mode: DrawMode,
    element_count: u32,
    attribute_buffers: Vec<AttributeBuffer>,
    attribute_mask: AttributeMask,
    index_buffer: Option<IndexBuffer>,
    bounds: Option<Bounds>,
    material: Option<MaterialKey>,
    instances: Vec<Instance>,
    active_frame_id: u64,
    complete: bool,
    completion: Option<Completion>,
    vertex_array: Option<VertexArrayHandle>,
}

impl RenderPrimitive {
    pub fn new(primitive: &Primitive) -> Self {
        let mut render_primitive = RenderPrimitive {
            mode: primitive.mode,
            element_count: 0,
            attribute_buffers: Vec::new(),
            attribute_mask: AttributeMask::empty(),
            index_buffer: None,
            bounds: None,
            material: None,
            instances: Vec::new(),
            active_frame_id: 0,
            complete: false,
            completion: None,
            vertex_array: None,
        };
        render_primitive.set_geometry(primitive);
        render_primitive
    }

    /// Replaces all geometry. Drops the cached vertex array and restarts completion tracking.
    pub fn set_geometry(&mut self, primitive: &Primitive) {
        self.mode = primitive.mode;
        self.element_count = primitive.element_count;
        self.completion = None;
        self.complete = false;
        self.vertex_array = None;
        self.attribute_buffers.clear();
        self.attribute_mask = AttributeMask::empty();

        for attribute in &primitive.attributes {
            self.attribute_mask |= attribute.semantic.mask();

            let render_attribute = RenderPrimitiveAttribute {
                location: attribute.semantic.location(),
                component_count: attribute.component_count,
                component_type: attribute.component_type,
                stride: attribute.stride,
                byte_offset: attribute.byte_offset,
                normalized: attribute.normalized,
            };

            match self
                .attribute_buffers
                .iter_mut()
                .find(|group| Arc::ptr_eq(&group.buffer, &attribute.buffer))
            {
                Some(group) => group.attributes.push(render_attribute),
                None => self.attribute_buffers.push(AttributeBuffer {
                    buffer: attribute.buffer.clone(),
                    attributes: vec![render_attribute],
                }),
            }
        }

        self.index_buffer = primitive.index.as_ref().map(|index| IndexBuffer {
            buffer: index.buffer.clone(),
            index_type: index.index_type,
            byte_offset: index.byte_offset,
        });
        self.bounds = primitive.bounds;

        if self.material.is_some() {
            let _ = self.wait_for_complete();
        }
    }

    pub(crate) fn set_material(&mut self, material: Option<MaterialKey>) {
        self.material = material;
        self.completion = None;
        self.complete = false;

        if self.material.is_some() {
            let _ = self.wait_for_complete();
        }
    }

    /// A shared handle resolving once every backing buffer has a GPU handle.
    ///
    /// Created on first request and reused until geometry or material change.
    pub fn wait_for_complete(&mut self) -> Result<Completion> {
        if let Some(completion) = &self.completion {
            return Ok(completion.clone());
        }

        self.material.context(MissingMaterialErr)?;

        let mut waiting: Vec<&Arc<RenderBuffer>> = Vec::new();
        let buffers = self
            .attribute_buffers
            .iter()
            .map(|group| &group.buffer)
            .chain(self.index_buffer.iter().map(|index| &index.buffer));
        for buffer in buffers {
            if !buffer.is_ready() && !waiting.iter().any(|b| b.id() == buffer.id()) {
                waiting.push(buffer);
            }
        }

        let pending = join_all(waiting.into_iter().map(|b| b.wait_for_complete()));
        let completion = pending
            .map(|results| results.iter().all(Result::is_ok))
            .boxed()
            .shared();

        self.completion = Some(completion.clone());
        Ok(completion)
    }

    /// Frame-local view of the completion handle. Never blocks.
    pub fn is_complete(&mut self) -> bool {
        if self.complete {
            return true;
        }

        let Some(completion) = &self.completion else {
            return false;
        };
        if completion.clone().now_or_never() == Some(true) {
            self.complete = true;
        }
        self.complete
    }

    /// Stamps the primitive active for `frame_id` if it is complete and its material is ready.
    pub(crate) fn mark_active(
        &mut self,
        frame_id: u64,
        materials: &mut SlotMap<MaterialKey, RenderMaterial>,
    ) {
        if self.active_frame_id == frame_id || !self.is_complete() {
            return;
        }

        if let Some(material) = self.material.and_then(|key| materials.get_mut(key)) {
            if !material.mark_active(frame_id) {
                return;
            }
        }
        self.active_frame_id = frame_id;
    }

    pub(crate) fn stamp_instance(&mut self, node: NodeId, world_matrix: &Matrix4<f32>, frame_id: u64) {
        match self.instances.iter_mut().find(|instance| instance.node == node) {
            Some(instance) => {
                instance.world_matrix = *world_matrix;
                instance.active_frame_id = frame_id;
            }
            None => self.instances.push(Instance {
                node,
                world_matrix: *world_matrix,
                active_frame_id: frame_id,
            }),
        }
    }

    pub(crate) fn remove_instance(&mut self, node: NodeId) -> bool {
        let before = self.instances.len();
        self.instances.retain(|instance| instance.node != node);
        before != self.instances.len()
    }

    /// Drops instances whose node was not reached in `frame_id`. Primitives reached by no node keep theirs.
    pub(crate) fn prune_instances(&mut self, frame_id: u64) -> usize {
        if !self.instances.iter().any(|instance| instance.active_frame_id == frame_id) {
            return 0;
        }
        let before = self.instances.len();
        self.instances.retain(|instance| instance.active_frame_id == frame_id);
        before - self.instances.len()
    }

    pub(crate) fn set_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.vertex_array = Some(vertex_array);
    }

    pub fn mode(&self) -> DrawMode {
        self.mode
    }

    pub fn element_count(&self) -> u32 {
        self.element_count
    }

    pub fn attribute_buffers(&self) -> &[AttributeBuffer] {
        &self.attribute_buffers
    }

    pub fn attribute_mask(&self) -> AttributeMask {
        self.attribute_mask
    }

    pub fn index_buffer(&self) -> Option<&IndexBuffer> {
        self.index_buffer.as_ref()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn material(&self) -> Option<MaterialKey> {
        self.material
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn active_frame_id(&self) -> u64 {
        self.active_frame_id
    }

    pub fn vertex_array(&self) -> Option<VertexArrayHandle> {
        self.vertex_array
    }
}

impl std::fmt::Debug for RenderPrimitive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPrimitive")
            .field("mode", &self.mode)
            .field("element_count", &self.element_count)
            .field("attribute_buffers", &self.attribute_buffers)
            .field("attribute_mask", &self.attribute_mask)
            .field("index_buffer", &self.index_buffer)
            .field("material", &self.material)
            .field("instances", &self.instances.len())
            .field("active_frame_id", &self.active_frame_id)
            .field("complete", &self.complete)
            .field("vertex_array", &self.vertex_array)
            .finish_non_exhaustive()
    }
}

/// Handed to [`SceneGraph::mark_active`](crate::core::SceneGraph::mark_active) once per frame.
pub struct ActiveMarker<'a> {
    frame_id: u64,
    primitives: &'a mut SlotMap<PrimitiveKey, RenderPrimitive>,
    materials: &'a mut SlotMap<MaterialKey, RenderMaterial>,
}

impl<'a> ActiveMarker<'a> {
    pub(crate) fn new(
        frame_id: u64,
        primitives: &'a mut SlotMap<PrimitiveKey, RenderPrimitive>,
        materials: &'a mut SlotMap<MaterialKey, RenderMaterial>,
    ) -> Self {
        ActiveMarker {
            frame_id,
            primitives,
            materials,
        }
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    /// Records `node` as an active placement of `primitive` at `world_matrix`.
    pub fn mark(&mut self, node: NodeId, world_matrix: &Matrix4<f32>, primitive: PrimitiveKey) {
        let Some(render_primitive) = self.primitives.get_mut(primitive) else {
            trace!("[Primitive] {node:?} references a removed primitive");
            return;
        };

        render_primitive.stamp_instance(node, world_matrix, self.frame_id);
        render_primitive.mark_active(self.frame_id, self.materials);
    }
}
