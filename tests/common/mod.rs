#![allow(dead_code)]

use nalgebra::{Isometry3, Matrix4, Vector3};
use prism::assets::{AttributeSemantic, Material, MaterialState, Primitive, PrimitiveAttribute};
use prism::core::{Eye, Node, RenderView, Viewport};
use prism::rendering::backend::{BufferTarget, HeadlessBackend};
use prism::rendering::{BufferSource, PrimitiveKey, RenderBuffer};
use prism::{Renderer, RendererConfig};
use std::sync::Arc;

pub const VERTEX: &str = "attribute vec3 POSITION;\n\
    vec4 vertex_main(mat4 proj, mat4 view, mat4 model) { return proj * view * model * vec4(POSITION, 1.0); }\n";

pub const FRAGMENT: &str = "uniform vec4 tint;\n\
    vec4 fragment_main() { return tint; }\n";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn renderer() -> Renderer<HeadlessBackend> {
    init_logging();
    Renderer::new(HeadlessBackend::new(), RendererConfig::default())
}

pub fn material(name: &str) -> Material {
    Material::builder()
        .name(name)
        .vertex_source(VERTEX)
        .fragment_source(FRAGMENT)
        .build()
}

pub fn material_with_state(name: &str, state: MaterialState) -> Material {
    Material::builder()
        .name(name)
        .vertex_source(VERTEX)
        .fragment_source(FRAGMENT)
        .state(state)
        .build()
}

pub fn triangle_positions() -> Vec<f32> {
    vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
}

pub fn position_buffer(renderer: &mut Renderer<HeadlessBackend>) -> Arc<RenderBuffer> {
    renderer
        .create_render_buffer(BufferTarget::Array, BufferSource::from_slice(&triangle_positions()))
        .unwrap()
}

pub fn triangle_with(buffer: &Arc<RenderBuffer>) -> Primitive {
    Primitive::builder()
        .element_count(3)
        .attributes(vec![
            PrimitiveAttribute::builder()
                .semantic(AttributeSemantic::Position)
                .buffer(buffer.clone())
                .component_count(3)
                .build(),
        ])
        .build()
}

pub fn triangle(renderer: &mut Renderer<HeadlessBackend>) -> Primitive {
    let buffer = position_buffer(renderer);
    triangle_with(&buffer)
}

pub fn mesh(renderer: &mut Renderer<HeadlessBackend>, material: &Material) -> (Node, PrimitiveKey) {
    let primitive = triangle(renderer);
    let node = renderer.create_mesh(&primitive, material).unwrap();
    let key = node.render_primitives()[0];
    (node, key)
}

pub fn view() -> RenderView {
    RenderView::new(
        Matrix4::new_perspective(1.0, 1.2, 0.1, 100.0),
        Isometry3::translation(0.0, 1.5, 4.0),
        Some(Viewport::new(0, 0, 800, 600)),
        Eye::Left,
    )
}

pub fn stereo_views() -> [RenderView; 2] {
    let projection = Matrix4::new_perspective(1.0, 1.2, 0.1, 100.0);
    [
        RenderView::new(
            projection,
            Isometry3::translation(-0.03, 1.5, 0.0),
            Some(Viewport::new(0, 0, 400, 600)),
            Eye::Left,
        ),
        RenderView::new(
            projection,
            Isometry3::translation(0.03, 1.5, 0.0),
            Some(Viewport::new(400, 0, 400, 600)),
            Eye::Right,
        ),
    ]
}

pub fn translated(name: &str, offset: Vector3<f32>) -> Node {
    let mut node = Node::new(name);
    node.local_transform = Matrix4::new_translation(&offset);
    node
}
