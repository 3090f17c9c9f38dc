use crate::engine::assets::{
    ImageFrame, ImagePoll, ImageSource, SamplerDesc, Texture, TextureFilter, TextureFingerprint,
    TextureSource, TextureWrap, VideoSource,
};
use crate::engine::rendering::backend::{GraphicsApi, TexImage, TextureHandle, TextureParameter};
use crate::engine::rendering::error::{BackendErr, MissingTextureKeyErr, Result, TextureKeyCollisionErr};
use dashmap::DashMap;
use log::{debug, trace, warn};
use snafu::{OptionExt, ResultExt, ensure};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// GPU side of a [`Texture`]. Shared by every material sampling the same key.
#[derive(Debug)]
pub struct RenderTexture {
    key: String,
    handle: TextureHandle,
    fingerprint: TextureFingerprint,
    complete: AtomicBool,
    active_frame_id: AtomicU64,
}

impl RenderTexture {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    /// Pixels have been uploaded at least once.
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    pub fn active_frame_id(&self) -> u64 {
        self.active_frame_id.load(Ordering::Acquire)
    }

    pub fn mark_active(&self, frame_id: u64) {
        self.active_frame_id.store(frame_id, Ordering::Release);
    }

    fn set_complete(&self) {
        self.complete.store(true, Ordering::Release);
    }
}

struct PendingImage {
    texture: Arc<RenderTexture>,
    source: ImageSource,
    sampler: SamplerDesc,
    mipmap: bool,
}

struct VideoStream {
    texture: Arc<RenderTexture>,
    source: Arc<dyn VideoSource>,
    sampler: SamplerDesc,
    mipmap: bool,
}

/// Render textures keyed by [`Texture::key`], plus the uploads still waiting on their pixels.
#[derive(Default)]
pub struct TextureCache {
    data: DashMap<String, Arc<RenderTexture>>,
    pending: Vec<PendingImage>,
    streams: Vec<VideoStream>,
}

const fn is_power_of_two(value: u32) -> bool {
    value != 0 && value & (value - 1) == 0
}

/// Uploads `frame` into the bound texture.
fn upload_frame<G: GraphicsApi>(gl: &mut G, handle: TextureHandle, frame: &ImageFrame) {
    gl.bind_texture(Some(handle));
    gl.tex_image_2d(TexImage {
        width: frame.width,
        height: frame.height,
        format: frame.format,
        pixel_type: frame.pixel_type,
        data: Some(&frame.data),
    });
}

/// Sets filtering and wrapping on the bound texture, generating mipmaps where they are allowed.
pub fn apply_sampler_parameters<G: GraphicsApi>(
    gl: &mut G,
    width: u32,
    height: u32,
    sampler: &SamplerDesc,
    mipmap: bool,
) {
    let power_of_two = is_power_of_two(width) && is_power_of_two(height);
    let mipmap = power_of_two && mipmap;
    if mipmap {
        gl.generate_mipmap();
    }

    let min_filter = sampler.min_filter.unwrap_or(if mipmap {
        TextureFilter::LinearMipmapLinear
    } else {
        TextureFilter::Linear
    });
    let default_wrap = if power_of_two {
        TextureWrap::Repeat
    } else {
        TextureWrap::ClampToEdge
    };
    let mag_filter = sampler.mag_filter.unwrap_or(TextureFilter::Linear);

    gl.tex_parameter(TextureParameter::MagFilter, mag_filter.gl_enum());
    gl.tex_parameter(TextureParameter::MinFilter, min_filter.gl_enum());
    gl.tex_parameter(
        TextureParameter::WrapS,
        sampler.wrap_s.unwrap_or(default_wrap).gl_enum(),
    );
    gl.tex_parameter(
        TextureParameter::WrapT,
        sampler.wrap_t.unwrap_or(default_wrap).gl_enum(),
    );
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the render texture for `texture`, creating and uploading it on first sight of its key.
    ///
    /// `None` in gives `None` out. A texture without a key, or one reusing a key
    /// for a different kind of image, is an error.
    pub fn get_or_create<G: GraphicsApi>(
        &mut self,
        gl: &mut G,
        texture: Option<&Texture>,
    ) -> Result<Option<Arc<RenderTexture>>> {
        let Some(texture) = texture else {
            return Ok(None);
        };

        let key = texture
            .key
            .as_deref()
            .filter(|key| !key.is_empty())
            .context(MissingTextureKeyErr)?;
        let fingerprint = texture.fingerprint();

        if let Some(existing) = self.data.get(key) {
            if existing.fingerprint != fingerprint {
                warn!(
                    "[Texture Cache] Key {key:?} reused for {fingerprint:?}, cached as {:?}",
                    existing.fingerprint
                );
            }
            ensure!(
                existing.fingerprint == fingerprint,
                TextureKeyCollisionErr { key }
            );
            trace!("[Texture Cache] Hit for {key:?}");
            return Ok(Some(existing.clone()));
        }

        let handle = gl.create_texture().context(BackendErr)?;
        let render_texture = Arc::new(RenderTexture {
            key: key.to_string(),
            handle,
            fingerprint,
            complete: AtomicBool::new(false),
            active_frame_id: AtomicU64::new(0),
        });

        match &texture.source {
            TextureSource::Data(frame) => {
                upload_frame(gl, handle, frame);
                apply_sampler_parameters(gl, frame.width, frame.height, &texture.sampler, texture.mipmap);
                render_texture.set_complete();
                debug!("[Texture Cache] Uploaded {key:?} ({}x{})", frame.width, frame.height);
            }
            TextureSource::Image(source) => {
                debug!("[Texture Cache] Waiting on image for {key:?}");
                self.pending.push(PendingImage {
                    texture: render_texture.clone(),
                    source: source.clone(),
                    sampler: texture.sampler,
                    mipmap: texture.mipmap,
                });
            }
            TextureSource::Video(source) => {
                debug!("[Texture Cache] Streaming video into {key:?}");
                self.streams.push(VideoStream {
                    texture: render_texture.clone(),
                    source: source.clone(),
                    sampler: texture.sampler,
                    mipmap: texture.mipmap,
                });
            }
        }

        self.data.insert(key.to_string(), render_texture.clone());
        Ok(Some(render_texture))
    }

    /// Uploads every deferred image whose pixels arrived and every video that produced its first frame.
    ///
    /// Returns the number of textures that became complete.
    pub fn poll_pending<G: GraphicsApi>(&mut self, gl: &mut G) -> usize {
        let mut completed = 0;

        self.pending.retain(|pending| match pending.source.poll_frame() {
            ImagePoll::Pending => true,
            ImagePoll::Dropped => {
                warn!(
                    "[Texture Cache] Image for {:?} was dropped before it arrived",
                    pending.texture.key
                );
                false
            }
            ImagePoll::Ready(frame) => {
                upload_frame(gl, pending.texture.handle, &frame);
                apply_sampler_parameters(gl, frame.width, frame.height, &pending.sampler, pending.mipmap);
                pending.texture.set_complete();
                debug!("[Texture Cache] Uploaded {:?} ({}x{})", pending.texture.key, frame.width, frame.height);
                completed += 1;
                false
            }
        });

        for stream in self.streams.iter().filter(|s| !s.texture.is_complete()) {
            let Some(frame) = stream.source.current_frame() else {
                continue;
            };
            upload_frame(gl, stream.texture.handle, &frame);
            apply_sampler_parameters(gl, frame.width, frame.height, &stream.sampler, stream.mipmap);
            stream.texture.set_complete();
            debug!("[Texture Cache] First video frame for {:?}", stream.texture.key);
            completed += 1;
        }

        completed
    }

    /// Re-uploads the current frame of every playing, non-stalled video that was used in `frame_id`.
    pub fn refresh_active<G: GraphicsApi>(&mut self, gl: &mut G, frame_id: u64) -> usize {
        let mut refreshed = 0;

        for stream in &self.streams {
            let texture = &stream.texture;
            if !texture.is_complete() || texture.active_frame_id() != frame_id {
                continue;
            }
            if !stream.source.is_playing() || stream.source.is_stalled() {
                continue;
            }
            let Some(frame) = stream.source.current_frame() else {
                continue;
            };
            upload_frame(gl, texture.handle, &frame);
            refreshed += 1;
        }

        refreshed
    }

    pub fn get(&self, key: &str) -> Option<Arc<RenderTexture>> {
        self.data.get(key).map(|t| t.clone())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len() + self.streams.iter().filter(|s| !s.texture.is_complete()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rendering::backend::{GlCall, HeadlessBackend};

    #[test]
    fn power_of_two_detection() {
        assert!(is_power_of_two(1));
        assert!(is_power_of_two(256));
        assert!(!is_power_of_two(0));
        assert!(!is_power_of_two(300));
    }

    #[test]
    fn mipmaps_only_for_power_of_two() {
        let mut gl = HeadlessBackend::new();
        apply_sampler_parameters(&mut gl, 256, 128, &SamplerDesc::default(), true);

        assert_eq!(gl.calls()[0], GlCall::GenerateMipmap);
        assert!(gl.calls().contains(&GlCall::TexParameter(
            TextureParameter::MinFilter,
            TextureFilter::LinearMipmapLinear.gl_enum()
        )));
        assert!(gl.calls().contains(&GlCall::TexParameter(
            TextureParameter::WrapS,
            TextureWrap::Repeat.gl_enum()
        )));

        gl.clear_calls();
        apply_sampler_parameters(&mut gl, 300, 128, &SamplerDesc::default(), true);

        assert!(!gl.calls().contains(&GlCall::GenerateMipmap));
        assert!(gl.calls().contains(&GlCall::TexParameter(
            TextureParameter::MinFilter,
            TextureFilter::Linear.gl_enum()
        )));
        assert!(gl.calls().contains(&GlCall::TexParameter(
            TextureParameter::WrapT,
            TextureWrap::ClampToEdge.gl_enum()
        )));
    }

    #[test]
    fn explicit_sampler_settings_win() {
        let mut gl = HeadlessBackend::new();
        let sampler = SamplerDesc::builder()
            .mag_filter(TextureFilter::Nearest)
            .wrap_s(TextureWrap::MirroredRepeat)
            .build();
        apply_sampler_parameters(&mut gl, 64, 64, &sampler, false);

        assert!(!gl.calls().contains(&GlCall::GenerateMipmap));
        assert!(gl.calls().contains(&GlCall::TexParameter(
            TextureParameter::MagFilter,
            TextureFilter::Nearest.gl_enum()
        )));
        assert!(gl.calls().contains(&GlCall::TexParameter(
            TextureParameter::WrapS,
            TextureWrap::MirroredRepeat.gl_enum()
        )));
        assert!(gl.calls().contains(&GlCall::TexParameter(
            TextureParameter::WrapT,
            TextureWrap::Repeat.gl_enum()
        )));
    }
}
