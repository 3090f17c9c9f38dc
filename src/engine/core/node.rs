use crate::engine::rendering::{ActiveMarker, PrimitiveKey};
use nalgebra::Matrix4;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Anything the renderer can walk once per frame to find out what is active.
pub trait SceneGraph {
    /// Stamps every visible placement reachable from here with the marker's frame id.
    fn mark_active(&mut self, marker: &mut ActiveMarker<'_>);
}

/// A minimal transform hierarchy. Every node referencing a primitive is one instance of it.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    pub name: String,
    pub visible: bool,
    pub local_transform: Matrix4<f32>,
    world_matrix: Matrix4<f32>,
    active_frame_id: u64,
    children: Vec<Node>,
    primitives: Vec<PrimitiveKey>,
}

impl Default for Node {
    fn default() -> Self {
        Node::new("Node")
    }
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Node {
            id: NodeId::next(),
            name: name.into(),
            visible: true,
            local_transform: Matrix4::identity(),
            world_matrix: Matrix4::identity(),
            active_frame_id: 0,
            children: Vec::new(),
            primitives: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn add_child(&mut self, child: Node) -> &mut Node {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [Node] {
        &mut self.children
    }

    pub fn add_render_primitive(&mut self, primitive: PrimitiveKey) {
        if !self.primitives.contains(&primitive) {
            self.primitives.push(primitive);
        }
    }

    pub fn remove_render_primitive(&mut self, primitive: PrimitiveKey) -> bool {
        let before = self.primitives.len();
        self.primitives.retain(|p| *p != primitive);
        before != self.primitives.len()
    }

    pub fn render_primitives(&self) -> &[PrimitiveKey] {
        &self.primitives
    }

    /// World matrix as of the last traversal.
    pub fn world_matrix(&self) -> &Matrix4<f32> {
        &self.world_matrix
    }

    pub fn active_frame_id(&self) -> u64 {
        self.active_frame_id
    }

    fn mark_active_under(&mut self, parent: &Matrix4<f32>, marker: &mut ActiveMarker<'_>) {
        if !self.visible || self.active_frame_id == marker.frame_id() {
            return;
        }

        self.active_frame_id = marker.frame_id();
        self.world_matrix = parent * self.local_transform;

        for primitive in &self.primitives {
            marker.mark(self.id, &self.world_matrix, *primitive);
        }

        let world = self.world_matrix;
        for child in &mut self.children {
            child.mark_active_under(&world, marker);
        }
    }
}

impl SceneGraph for Node {
    fn mark_active(&mut self, marker: &mut ActiveMarker<'_>) {
        self.mark_active_under(&Matrix4::identity(), marker);
    }
}
