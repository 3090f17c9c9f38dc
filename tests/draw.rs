mod common;

use common::*;
use futures::channel::oneshot;
use nalgebra::Vector3;
use prism::assets::{Caps, MaterialState, RenderOrder, compute_state_delta};
use prism::core::{Node, RenderView};
use prism::rendering::backend::{BufferTarget, GlCall, HeadlessBackend, ProgramHandle};
use prism::rendering::shaders::MODEL_MATRIX;
use prism::rendering::{BufferSource, DrawExtension, FrameInfo, PrimitiveKey};
use prism::{FrameContext, Renderer, RendererConfig};

fn program_of(renderer: &Renderer<HeadlessBackend>, key: PrimitiveKey) -> ProgramHandle {
    let material = renderer.primitive(key).unwrap().material().unwrap();
    renderer.material(material).unwrap().program().handle()
}

fn draw(renderer: &mut Renderer<HeadlessBackend>, views: &[RenderView], root: &mut Node) {
    renderer.draw_views(views, Some(root), &mut FrameContext::new(0.0));
}

fn count(renderer: &Renderer<HeadlessBackend>, predicate: impl Fn(&GlCall) -> bool) -> usize {
    renderer.gl().count_calls(predicate)
}

#[test]
fn unresolved_buffer_keeps_primitive_out_until_resolved() {
    let mut renderer = renderer();
    let (tx, rx) = oneshot::channel();
    let buffer = renderer
        .create_render_buffer(BufferTarget::Array, BufferSource::from_receiver(rx))
        .unwrap();
    let primitive = triangle_with(&buffer);
    let mut node = renderer.create_mesh(&primitive, &material("lit")).unwrap();
    let key = node.render_primitives()[0];

    draw(&mut renderer, &[view()], &mut node);
    assert_eq!(renderer.last_frame_stats().draw_calls, 0);
    assert!(!buffer.is_ready());
    assert!(!renderer.primitive_mut(key).unwrap().is_complete());

    let data: Vec<u8> = bytemuck::cast_slice(&triangle_positions()).to_vec();
    tx.send(data.clone()).unwrap();
    draw(&mut renderer, &[view()], &mut node);

    assert_eq!(renderer.last_frame_stats().draw_calls, 1);
    let handle = buffer.handle().unwrap();
    assert_eq!(buffer.len(), data.len());
    assert_eq!(renderer.gl().buffer_contents(handle), Some(data.as_slice()));
}

#[test]
fn identical_state_emits_no_state_calls() {
    let mut renderer = renderer();
    let (a, _) = mesh(&mut renderer, &material("a"));
    let (b, _) = mesh(&mut renderer, &material("b"));
    let mut root = Node::new("root");
    root.add_child(a);
    root.add_child(b);

    renderer.gl_mut().clear_calls();
    draw(&mut renderer, &[view()], &mut root);

    let full = compute_state_delta(None, MaterialState::default()).len();
    let stats = *renderer.last_frame_stats();
    assert_eq!(stats.material_binds, 2);
    assert_eq!(stats.program_switches, 2);
    assert_eq!(stats.state_changes, full);
    assert_eq!(stats.draw_calls, 2);

    let calls = renderer.gl().calls();
    let second_program = calls
        .iter()
        .rposition(|call| matches!(call, GlCall::UseProgram(_)))
        .unwrap();
    let last_draw = calls.iter().rposition(GlCall::is_draw).unwrap();
    assert!(!calls[second_program..last_draw].iter().any(GlCall::is_state_change));
}

#[test]
fn opaque_draws_before_transparent() {
    let mut renderer = renderer();
    let glass = material_with_state(
        "glass",
        MaterialState::default()
            .with_caps(Caps::BLEND)
            .without_caps(Caps::DEPTH_MASK),
    );
    let (glass_node, glass_key) = mesh(&mut renderer, &glass);
    let (stone_node, stone_key) = mesh(&mut renderer, &material("stone"));
    let mut root = Node::new("root");
    root.add_child(glass_node);
    root.add_child(stone_node);

    assert_eq!(renderer.render_order_bucket(RenderOrder::Transparent), [glass_key]);
    assert_eq!(renderer.render_order_bucket(RenderOrder::Opaque), [stone_key]);

    renderer.gl_mut().clear_calls();
    draw(&mut renderer, &[view()], &mut root);

    let glass_program = program_of(&renderer, glass_key);
    let stone_program = program_of(&renderer, stone_key);
    let programs: Vec<_> = renderer
        .gl()
        .calls()
        .iter()
        .filter_map(|call| match call {
            GlCall::UseProgram(program) => Some(*program),
            _ => None,
        })
        .collect();
    assert_eq!(programs, [stone_program, glass_program]);
}

#[test]
fn explicit_render_order_wins() {
    let mut renderer = renderer();
    let mut sky = material("sky");
    sky.render_order = RenderOrder::Sky;
    let (_node, key) = mesh(&mut renderer, &sky);

    assert_eq!(renderer.render_order_bucket(RenderOrder::Sky), [key]);
    assert!(renderer.render_order_bucket(RenderOrder::Opaque).is_empty());
}

#[test]
fn inactive_primitives_are_skipped() {
    let mut renderer = renderer();
    let lit = material("lit");
    let (a, _) = mesh(&mut renderer, &lit);
    let (b, _) = mesh(&mut renderer, &lit);
    let mut root = Node::new("root");
    root.add_child(a);
    root.add_child(b);

    draw(&mut renderer, &[view()], &mut root);
    assert_eq!(renderer.last_frame_stats().draw_calls, 2);

    root.children_mut()[1].visible = false;
    draw(&mut renderer, &[view()], &mut root);

    let stats = renderer.last_frame_stats();
    assert_eq!(stats.frame_id, 2);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.skipped_primitives, 1);
}

#[test]
fn masks_are_restored_at_frame_end() {
    let mut renderer = renderer();
    let overlay = material_with_state(
        "overlay",
        MaterialState::default().without_caps(Caps::DEPTH_MASK),
    );
    let (mut node, _) = mesh(&mut renderer, &overlay);

    renderer.gl_mut().clear_calls();
    draw(&mut renderer, &[view()], &mut node);

    let calls = renderer.gl().calls();
    assert!(calls.contains(&GlCall::DepthMask(false)));
    assert_eq!(
        &calls[calls.len() - 3..],
        [
            GlCall::BindVertexArray(None),
            GlCall::DepthMask(true),
            GlCall::StencilMask(true),
        ]
    );
}

#[test]
fn vertex_array_is_built_once() {
    let mut renderer = renderer();
    let (mut node, key) = mesh(&mut renderer, &material("lit"));

    draw(&mut renderer, &[view()], &mut node);
    assert_eq!(renderer.last_frame_stats().vertex_arrays_created, 1);
    let vertex_array = renderer.primitive(key).unwrap().vertex_array().unwrap();

    renderer.gl_mut().clear_calls();
    draw(&mut renderer, &[view()], &mut node);

    assert_eq!(renderer.last_frame_stats().vertex_arrays_created, 0);
    assert_eq!(count(&renderer, |c| matches!(c, GlCall::CreateVertexArray(_))), 0);
    assert_eq!(count(&renderer, |c| matches!(c, GlCall::VertexAttribPointer(_))), 0);
    assert!(renderer.gl().calls().contains(&GlCall::BindVertexArray(Some(vertex_array))));
}

#[test]
fn without_vertex_arrays_attributes_toggle_on_mask_change() {
    init_logging();
    let mut renderer = Renderer::new(
        HeadlessBackend::new().without_vertex_arrays(),
        RendererConfig::default(),
    );
    let lit = material("lit");
    let (a, _) = mesh(&mut renderer, &lit);
    let (b, _) = mesh(&mut renderer, &lit);
    let mut root = Node::new("root");
    root.add_child(a);
    root.add_child(b);

    renderer.gl_mut().clear_calls();
    draw(&mut renderer, &[view()], &mut root);

    let toggles = count(&renderer, |c| {
        matches!(
            c,
            GlCall::EnableVertexAttribArray(_) | GlCall::DisableVertexAttribArray(_)
        )
    });
    assert_eq!(toggles, 6);
    assert!(renderer.gl().calls().contains(&GlCall::EnableVertexAttribArray(1)));
    assert!(renderer.gl().calls().contains(&GlCall::DisableVertexAttribArray(2)));
    assert_eq!(count(&renderer, |c| matches!(c, GlCall::VertexAttribPointer(_))), 2);
    assert_eq!(
        count(&renderer, |c| *c == GlCall::BindBuffer(BufferTarget::ElementArray, None)),
        2
    );
    assert_eq!(count(&renderer, |c| matches!(c, GlCall::BindVertexArray(_))), 0);
    assert_eq!(renderer.last_frame_stats().draw_calls, 2);
}

#[test]
fn single_view_sets_viewport_once() {
    let mut renderer = renderer();
    let lit = material("lit");
    let (a, _) = mesh(&mut renderer, &lit);
    let (b, _) = mesh(&mut renderer, &lit);
    let mut root = Node::new("root");
    root.add_child(a);
    root.add_child(b);

    renderer.gl_mut().clear_calls();
    draw(&mut renderer, &[view()], &mut root);

    assert_eq!(count(&renderer, |c| matches!(c, GlCall::Viewport(_))), 1);
    assert_eq!(renderer.last_frame_stats().draw_calls, 2);
}

#[test]
fn every_view_draws_every_instance() {
    let mut renderer = renderer();
    let lit = material("lit");
    let (a, _) = mesh(&mut renderer, &lit);
    let (b, _) = mesh(&mut renderer, &lit);
    let mut root = Node::new("root");
    root.add_child(a);
    root.add_child(b);

    renderer.gl_mut().clear_calls();
    draw(&mut renderer, &stereo_views(), &mut root);

    assert_eq!(count(&renderer, |c| matches!(c, GlCall::Viewport(_))), 4);
    assert_eq!(renderer.last_frame_stats().draw_calls, 4);
}

#[test]
fn shared_primitive_draws_once_per_instance() {
    let mut renderer = renderer();
    let primitive = triangle(&mut renderer);
    let key = renderer
        .create_render_primitive(&primitive, &material("lit"))
        .unwrap();

    let mut left = translated("left", Vector3::new(-1.0, 0.0, 0.0));
    let mut right = translated("right", Vector3::new(1.0, 0.0, 0.0));
    left.add_render_primitive(key);
    right.add_render_primitive(key);
    let mut root = Node::new("root");
    root.add_child(left);
    root.add_child(right);

    renderer.gl_mut().clear_calls();
    draw(&mut renderer, &[view()], &mut root);

    let model = renderer
        .material(renderer.primitive(key).unwrap().material().unwrap())
        .unwrap()
        .program()
        .uniform(MODEL_MATRIX)
        .unwrap();
    let translations: Vec<f32> = renderer
        .gl()
        .calls()
        .iter()
        .filter_map(|call| match call {
            GlCall::UniformMatrix4(location, matrix) if *location == model => Some(matrix[(0, 3)]),
            _ => None,
        })
        .collect();

    assert_eq!(translations, [-1.0, 1.0]);
    assert_eq!(renderer.primitive(key).unwrap().instances().len(), 2);
    assert_eq!(renderer.last_frame_stats().draw_calls, 2);
}

#[test]
fn removed_primitive_is_not_drawn() {
    let mut renderer = renderer();
    let (mut node, key) = mesh(&mut renderer, &material("lit"));
    let material = renderer.primitive(key).unwrap().material().unwrap();

    assert!(renderer.remove_render_primitive(key));
    assert!(renderer.material(material).is_none());

    draw(&mut renderer, &[view()], &mut node);
    assert_eq!(renderer.last_frame_stats().draw_calls, 0);
}

#[derive(Default)]
struct Overlay {
    frames: Vec<FrameInfo>,
    draws_before: usize,
}

impl DrawExtension<HeadlessBackend> for Overlay {
    fn draw(&mut self, gl: &mut HeadlessBackend, views: &[RenderView], frame: &FrameInfo) {
        assert_eq!(views.len(), 1);
        self.frames.push(*frame);
        self.draws_before = gl.count_calls(GlCall::is_draw);
    }
}

#[test]
fn extensions_run_after_the_core_pass() {
    let mut renderer = renderer();
    let (mut node, _) = mesh(&mut renderer, &material("lit"));
    let mut overlay = Overlay::default();

    renderer.gl_mut().clear_calls();
    renderer.draw_views(
        &[view()],
        Some(&mut node),
        &mut FrameContext::new(2.5).with_extension(&mut overlay),
    );

    assert_eq!(overlay.frames, [FrameInfo { frame_id: 1, time: 2.5 }]);
    assert_eq!(overlay.draws_before, 1);
}

#[test]
fn light_uniforms_follow_runtime_changes() {
    let mut renderer = renderer();
    let lit = prism::assets::Material::builder()
        .name("lights")
        .vertex_source(VERTEX)
        .fragment_source("uniform vec3 LIGHT_COLOR;\nvec4 fragment_main() { return vec4(LIGHT_COLOR, 1.0); }")
        .build();
    let (mut node, key) = mesh(&mut renderer, &lit);
    renderer.set_global_light_color(Vector3::new(1.0, 0.5, 0.25));

    renderer.gl_mut().clear_calls();
    draw(&mut renderer, &[view()], &mut node);

    let location = renderer
        .material(renderer.primitive(key).unwrap().material().unwrap())
        .unwrap()
        .program()
        .uniform("LIGHT_COLOR")
        .unwrap();
    assert!(
        renderer
            .gl()
            .calls()
            .contains(&GlCall::UniformFv {
                arity: 3,
                location,
                value: vec![1.0, 0.5, 0.25],
            })
    );
}

#[test]
fn replacing_geometry_rebuilds_vertex_array_once_ready() {
    let mut renderer = renderer();
    let (mut node, key) = mesh(&mut renderer, &material("lit"));

    draw(&mut renderer, &[view()], &mut node);
    assert_eq!(renderer.last_frame_stats().draw_calls, 1);
    let first = renderer.primitive(key).unwrap().vertex_array().unwrap();

    let (tx, rx) = oneshot::channel();
    let pending = renderer
        .create_render_buffer(BufferTarget::Array, BufferSource::from_receiver(rx))
        .unwrap();
    renderer
        .set_primitive_geometry(key, &triangle_with(&pending))
        .unwrap();
    assert_eq!(renderer.primitive(key).unwrap().vertex_array(), None);

    draw(&mut renderer, &[view()], &mut node);
    assert_eq!(renderer.last_frame_stats().draw_calls, 0);

    tx.send(bytemuck::cast_slice(&triangle_positions()).to_vec())
        .unwrap();
    draw(&mut renderer, &[view()], &mut node);

    assert_eq!(renderer.last_frame_stats().draw_calls, 1);
    assert_eq!(renderer.last_frame_stats().vertex_arrays_created, 1);
    let second = renderer.primitive(key).unwrap().vertex_array().unwrap();
    assert_ne!(first, second);
}

#[test]
fn instances_of_detached_nodes_are_pruned() {
    let mut renderer = renderer();
    let primitive = triangle(&mut renderer);
    let key = renderer
        .create_render_primitive(&primitive, &material("lit"))
        .unwrap();

    let mut root = Node::new("root");
    for name in ["a", "b", "c"] {
        root.add_child(Node::new(name)).add_render_primitive(key);
    }

    draw(&mut renderer, &[view()], &mut root);
    assert_eq!(renderer.primitive(key).unwrap().instances().len(), 3);

    for child in &mut root.children_mut()[1..] {
        child.remove_render_primitive(key);
    }
    draw(&mut renderer, &[view()], &mut root);

    let instances = renderer.primitive(key).unwrap().instances();
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].node, root.children()[0].id());
    assert_eq!(renderer.last_frame_stats().draw_calls, 1);
}
