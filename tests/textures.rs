mod common;

use common::*;
use futures::channel::oneshot;
use prism::assets::{ImageFrame, ImageSource, Material, MaterialSampler, Texture, VideoSource};
use prism::rendering::backend::GlCall;
use prism::rendering::RenderError;
use prism::FrameContext;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const TEXTURED_FRAGMENT: &str = "uniform sampler2D baseColor;\n\
    vec4 fragment_main() { return texture2D(baseColor, vec2(0.5)); }\n";

fn textured(name: &str, texture: Texture) -> Material {
    Material::builder()
        .name(name)
        .vertex_source(VERTEX)
        .fragment_source(TEXTURED_FRAGMENT)
        .samplers(vec![MaterialSampler::new("baseColor", Some(texture))])
        .build()
}

fn checker() -> ImageFrame {
    ImageFrame::rgba8(2, 2, vec![255; 16])
}

fn texture_uploads(calls: &[GlCall]) -> usize {
    calls
        .iter()
        .filter(|call| matches!(call, GlCall::TexImage2D { .. }))
        .count()
}

struct TestVideo {
    playing: AtomicBool,
    stalled: AtomicBool,
}

impl VideoSource for TestVideo {
    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::Relaxed)
    }

    fn current_frame(&self) -> Option<ImageFrame> {
        Some(ImageFrame::rgba8(4, 4, vec![0; 64]))
    }
}

#[test]
fn same_key_shares_one_render_texture() {
    let mut renderer = renderer();
    let first = triangle(&mut renderer);
    let second = triangle(&mut renderer);

    let a = renderer
        .create_render_primitive(&first, &textured("a", Texture::from_data("checker", checker())))
        .unwrap();
    let b = renderer
        .create_render_primitive(&second, &textured("b", Texture::from_data("checker", checker())))
        .unwrap();

    let texture_of = |key| {
        let material = renderer.primitive(key).unwrap().material().unwrap();
        renderer.material(material).unwrap().samplers()[0]
            .texture()
            .unwrap()
            .clone()
    };

    assert!(Arc::ptr_eq(&texture_of(a), &texture_of(b)));
    assert_eq!(renderer.texture_cache().len(), 1);
    assert_eq!(texture_uploads(renderer.gl().calls()), 1);
}

#[test]
fn texture_without_key_is_rejected() {
    let mut renderer = renderer();
    let primitive = triangle(&mut renderer);
    let keyless = Texture::builder()
        .source(prism::assets::TextureSource::Data(checker()))
        .build();

    let err = renderer
        .create_render_primitive(&primitive, &textured("keyless", keyless))
        .unwrap_err();
    assert!(matches!(err, RenderError::MissingTextureKey));
}

#[test]
fn reused_key_for_other_image_is_a_collision() {
    let mut renderer = renderer();
    let first = triangle(&mut renderer);
    let second = triangle(&mut renderer);

    renderer
        .create_render_primitive(&first, &textured("a", Texture::from_data("albedo", checker())))
        .unwrap();

    let bigger = Texture::from_data("albedo", ImageFrame::rgba8(4, 4, vec![0; 64]));
    let err = renderer
        .create_render_primitive(&second, &textured("b", bigger))
        .unwrap_err();
    match err {
        RenderError::TextureKeyCollision { key } => assert_eq!(key, "albedo"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn loading_texture_keeps_primitive_out_of_the_frame() {
    let mut renderer = renderer();
    let (tx, rx) = oneshot::channel();
    let material = textured("late", Texture::from_image("late", ImageSource::from_receiver(rx)));
    let (mut node, key) = mesh(&mut renderer, &material);

    renderer.draw_views(&[view()], Some(&mut node), &mut FrameContext::new(0.0));
    assert_eq!(renderer.last_frame_stats().draw_calls, 0);
    assert_ne!(renderer.primitive(key).unwrap().active_frame_id(), renderer.frame_id());

    tx.send(checker()).unwrap();
    renderer.draw_views(&[view()], Some(&mut node), &mut FrameContext::new(0.1));

    assert_eq!(renderer.last_frame_stats().draw_calls, 1);
    assert_eq!(renderer.texture_cache().pending_count(), 0);
    assert!(renderer.texture_cache().get("late").unwrap().is_complete());
}

#[test]
fn incomplete_texture_stamps_material_but_skips_draw() {
    let mut renderer = renderer();
    let (_tx, rx) = oneshot::channel::<ImageFrame>();
    let material = textured("late", Texture::from_image("late", ImageSource::from_receiver(rx)));
    let (mut node, key) = mesh(&mut renderer, &material);
    let material = renderer.primitive(key).unwrap().material().unwrap();

    renderer.gl_mut().clear_calls();
    renderer.draw_views(&[view()], Some(&mut node), &mut FrameContext::new(0.0));

    assert_eq!(renderer.material(material).unwrap().active_frame_id(), renderer.frame_id());
    assert!(
        !renderer
            .gl()
            .calls()
            .iter()
            .any(|call| matches!(call, GlCall::BindTexture(Some(_))))
    );
}

#[test]
fn swapping_sampler_texture_goes_through_the_cache() {
    let mut renderer = renderer();
    let material = textured("swap", Texture::from_data("first", checker()));
    let (_node, key) = mesh(&mut renderer, &material);
    let material = renderer.primitive(key).unwrap().material().unwrap();

    let swapped = renderer
        .set_material_texture(material, "baseColor", Some(&Texture::from_data("second", checker())))
        .unwrap();
    assert!(swapped);
    assert_eq!(renderer.texture_cache().len(), 2);
    assert_eq!(
        renderer.material(material).unwrap().samplers()[0].texture().unwrap().key(),
        "second"
    );

    assert!(!renderer.set_material_texture(material, "missing", None).unwrap());
}

#[test]
fn video_refreshes_only_while_active_and_playing() {
    let mut renderer = renderer();
    let video = Arc::new(TestVideo {
        playing: AtomicBool::new(true),
        stalled: AtomicBool::new(false),
    });
    let material = textured("screen", Texture::from_video("screen", video.clone()));
    let (mut node, _key) = mesh(&mut renderer, &material);

    // first frame arrives during polling, the texture is complete afterwards
    renderer.draw_views(&[view()], Some(&mut node), &mut FrameContext::new(0.0));
    assert!(renderer.texture_cache().get("screen").unwrap().is_complete());

    renderer.gl_mut().clear_calls();
    renderer.draw_views(&[view()], Some(&mut node), &mut FrameContext::new(0.1));
    assert_eq!(texture_uploads(renderer.gl().calls()), 1);

    video.stalled.store(true, Ordering::Relaxed);
    renderer.gl_mut().clear_calls();
    renderer.draw_views(&[view()], Some(&mut node), &mut FrameContext::new(0.2));
    assert_eq!(texture_uploads(renderer.gl().calls()), 0);

    video.stalled.store(false, Ordering::Relaxed);
    video.playing.store(false, Ordering::Relaxed);
    renderer.gl_mut().clear_calls();
    renderer.draw_views(&[view()], Some(&mut node), &mut FrameContext::new(0.3));
    assert_eq!(texture_uploads(renderer.gl().calls()), 0);

    video.playing.store(true, Ordering::Relaxed);
    node.visible = false;
    renderer.gl_mut().clear_calls();
    renderer.draw_views(&[view()], Some(&mut node), &mut FrameContext::new(0.4));
    assert_eq!(texture_uploads(renderer.gl().calls()), 0);
}
