use bon::Builder;
use futures::channel::oneshot;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::sync::Arc;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Alpha = 0x1906,
    Rgb = 0x1907,
    Rgba = 0x1908,
    Luminance = 0x1909,
    LuminanceAlpha = 0x190A,
}

impl PixelFormat {
    pub const fn gl_enum(self) -> u32 {
        self as u32
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelType {
    UnsignedByte = 0x1401,
    Float = 0x1406,
    UnsignedShort4444 = 0x8033,
    UnsignedShort5551 = 0x8034,
    UnsignedShort565 = 0x8363,
}

impl PixelType {
    pub const fn gl_enum(self) -> u32 {
        self as u32
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    Nearest = 0x2600,
    Linear = 0x2601,
    NearestMipmapNearest = 0x2700,
    LinearMipmapNearest = 0x2701,
    NearestMipmapLinear = 0x2702,
    LinearMipmapLinear = 0x2703,
}

impl TextureFilter {
    pub const fn gl_enum(self) -> u32 {
        self as u32
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureWrap {
    Repeat = 0x2901,
    ClampToEdge = 0x812F,
    MirroredRepeat = 0x8370,
}

impl TextureWrap {
    pub const fn gl_enum(self) -> u32 {
        self as u32
    }
}

/// Explicit sampler settings. Unset fields are derived from the texture size at upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Builder)]
pub struct SamplerDesc {
    pub min_filter: Option<TextureFilter>,
    pub mag_filter: Option<TextureFilter>,
    pub wrap_s: Option<TextureWrap>,
    pub wrap_t: Option<TextureWrap>,
}

/// Decoded pixels, ready to be handed to the graphics API.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixel_type: PixelType,
    pub data: Vec<u8>,
}

impl ImageFrame {
    pub fn rgba8(width: u32, height: u32, data: Vec<u8>) -> Self {
        ImageFrame {
            width,
            height,
            format: PixelFormat::Rgba,
            pixel_type: PixelType::UnsignedByte,
            data,
        }
    }
}

/// A deferred image. Resolves to `None` if the producer went away without delivering pixels.
#[derive(Clone)]
pub struct ImageSource(Shared<BoxFuture<'static, Option<Arc<ImageFrame>>>>);

impl ImageSource {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Option<ImageFrame>> + Send + 'static,
    {
        ImageSource(future.map(|frame| frame.map(Arc::new)).boxed().shared())
    }

    pub fn from_receiver(receiver: oneshot::Receiver<ImageFrame>) -> Self {
        Self::new(receiver.map(Result::ok))
    }

    pub fn ready(frame: ImageFrame) -> Self {
        Self::new(futures::future::ready(Some(frame)))
    }

    /// Polls the source once without blocking.
    pub fn poll_frame(&self) -> ImagePoll {
        match self.0.clone().now_or_never() {
            None => ImagePoll::Pending,
            Some(Some(frame)) => ImagePoll::Ready(frame),
            Some(None) => ImagePoll::Dropped,
        }
    }
}

impl Debug for ImageSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ImageSource").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum ImagePoll {
    Pending,
    Ready(Arc<ImageFrame>),
    Dropped,
}

/// A continuously updating pixel source such as a decoded video stream.
pub trait VideoSource: Send + Sync {
    fn is_playing(&self) -> bool;

    /// Playback is waiting on data and the current frame is stale.
    fn is_stalled(&self) -> bool;

    /// The frame to display right now, `None` until the first frame was decoded.
    fn current_frame(&self) -> Option<ImageFrame>;
}

#[derive(Clone)]
pub enum TextureSource {
    /// Pixels available right away, uploaded synchronously.
    Data(ImageFrame),
    /// Pixels arriving later, uploaded once.
    Image(ImageSource),
    /// Uploaded once the first frame exists and refreshed on every frame the texture is in use.
    Video(Arc<dyn VideoSource>),
}

impl Debug for TextureSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TextureSource::Data(frame) => f
                .debug_struct("Data")
                .field("width", &frame.width)
                .field("height", &frame.height)
                .field("format", &frame.format)
                .finish_non_exhaustive(),
            TextureSource::Image(image) => image.fmt(f),
            TextureSource::Video(_) => f.write_str("Video"),
        }
    }
}

/// What a texture key is allowed to stand for. Two textures sharing a key must agree on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFingerprint {
    Data {
        width: u32,
        height: u32,
        format: PixelFormat,
        pixel_type: PixelType,
    },
    Image,
    Video,
}

#[derive(Debug, Clone, Builder)]
pub struct Texture {
    #[builder(into)]
    pub key: Option<String>,
    #[builder(default)]
    pub sampler: SamplerDesc,
    #[builder(default = true)]
    pub mipmap: bool,
    pub source: TextureSource,
}

impl Texture {
    pub fn from_data(key: impl Into<String>, frame: ImageFrame) -> Self {
        Texture::builder()
            .key(key.into())
            .source(TextureSource::Data(frame))
            .build()
    }

    pub fn from_image(key: impl Into<String>, image: ImageSource) -> Self {
        Texture::builder()
            .key(key.into())
            .source(TextureSource::Image(image))
            .build()
    }

    pub fn from_video(key: impl Into<String>, video: Arc<dyn VideoSource>) -> Self {
        Texture::builder()
            .key(key.into())
            .source(TextureSource::Video(video))
            .build()
    }

    pub fn fingerprint(&self) -> TextureFingerprint {
        match &self.source {
            TextureSource::Data(frame) => TextureFingerprint::Data {
                width: frame.width,
                height: frame.height,
                format: frame.format,
                pixel_type: frame.pixel_type,
            },
            TextureSource::Image(_) => TextureFingerprint::Image,
            TextureSource::Video(_) => TextureFingerprint::Video,
        }
    }
}
