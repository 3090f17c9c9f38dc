use crate::engine::rendering::backend::{BufferHandle, BufferTarget, BufferUsage};
use bytemuck::Pod;
use futures::channel::oneshot;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::OnceLock;

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Resolves once the buffer owns a GPU handle, or with `Err` if its data never arrives.
pub type BufferReady = Shared<oneshot::Receiver<()>>;

/// Where the bytes of a new buffer come from.
pub enum BufferSource {
    Immediate(Vec<u8>),
    /// Resolves to `None` if the producer gave up.
    Pending(BoxFuture<'static, Option<Vec<u8>>>),
}

impl BufferSource {
    pub fn from_slice<T: Pod>(data: &[T]) -> Self {
        BufferSource::Immediate(bytemuck::cast_slice(data).to_vec())
    }

    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Option<Vec<u8>>> + Send + 'static,
    {
        BufferSource::Pending(future.boxed())
    }

    pub fn from_receiver(receiver: oneshot::Receiver<Vec<u8>>) -> Self {
        Self::pending(receiver.map(Result::ok))
    }
}

impl Debug for BufferSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferSource::Immediate(data) => f.debug_tuple("Immediate").field(&data.len()).finish(),
            BufferSource::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// A GPU buffer whose handle may still be on its way.
///
/// The handle is assigned exactly once and never changes afterwards.
pub struct RenderBuffer {
    id: u64,
    target: BufferTarget,
    usage: BufferUsage,
    handle: OnceLock<BufferHandle>,
    length: AtomicUsize,
    ready: BufferReady,
}

impl RenderBuffer {
    pub(crate) fn new(target: BufferTarget, usage: BufferUsage) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        let buffer = RenderBuffer {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            target,
            usage,
            handle: OnceLock::new(),
            length: AtomicUsize::new(0),
            ready: rx.shared(),
        };
        (buffer, tx)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn target(&self) -> BufferTarget {
        self.target
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn handle(&self) -> Option<BufferHandle> {
        self.handle.get().copied()
    }

    pub fn is_ready(&self) -> bool {
        self.handle.get().is_some()
    }

    /// Byte length of the last full upload.
    pub fn len(&self) -> usize {
        self.length.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn wait_for_complete(&self) -> BufferReady {
        self.ready.clone()
    }

    pub(crate) fn set_len(&self, length: usize) {
        self.length.store(length, Ordering::Release);
    }

    /// Publishes the handle. Returns `false` if one was already assigned.
    pub(crate) fn resolve(&self, handle: BufferHandle, length: usize, ready: oneshot::Sender<()>) -> bool {
        if self.handle.set(handle).is_err() {
            return false;
        }
        self.set_len(length);
        // nobody waiting is fine
        let _ = ready.send(());
        true
    }
}

impl Debug for RenderBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderBuffer")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("usage", &self.usage)
            .field("handle", &self.handle())
            .field("length", &self.len())
            .finish()
    }
}
