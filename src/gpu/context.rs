//! GPU device ownership and "current context" binding.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use wgpu::{Adapter, Device, Instance, Queue};

use crate::config::PowerPreference;
use crate::error::RealizeError;
use crate::renderer::RendererKind;

/// Identifies one GPU context for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: Cell<Option<ContextId>> = const { Cell::new(None) };
}

/// The context current on the calling thread, if any.
pub fn current_context() -> Option<ContextId> {
    CURRENT.with(|c| c.get())
}

/// Serialises use of one context across threads.
///
/// Binding makes the context current on the calling thread until the
/// returned guard drops, at which point whatever was current before is
/// restored. While bound, other threads trying to bind the same context
/// block. Re-binding a context that is already current on this thread
/// nests without locking. Binding a different context while one is bound
/// holds both locks, so renderers finish reading other contexts' textures
/// before binding their own.
pub struct ContextBinding {
    id: ContextId,
    lock: Mutex<()>,
}

impl Default for ContextBinding {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextBinding {
    pub fn new() -> Self {
        Self {
            id: ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)),
            lock: Mutex::new(()),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn is_current(&self) -> bool {
        current_context() == Some(self.id)
    }

    pub fn bind(&self) -> CurrentGuard<'_> {
        let previous = current_context();
        let lock = if previous == Some(self.id) {
            None
        } else {
            // A panic while bound leaves nothing half-written behind the
            // lock, so poisoning is ignored
            Some(self.lock.lock().unwrap_or_else(|e| e.into_inner()))
        };
        CURRENT.with(|c| c.set(Some(self.id)));
        CurrentGuard {
            previous,
            _lock: lock,
        }
    }
}

/// Keeps a context current; see [`ContextBinding::bind`].
#[must_use = "the context is released as soon as the guard is dropped"]
pub struct CurrentGuard<'a> {
    previous: Option<ContextId>,
    _lock: Option<MutexGuard<'a, ()>>,
}

impl Drop for CurrentGuard<'_> {
    fn drop(&mut self) {
        CURRENT.with(|c| c.set(self.previous));
    }
}

struct ContextInner {
    kind: RendererKind,
    binding: ContextBinding,
    instance: Instance,
    adapter: Adapter,
    device: Device,
    queue: Queue,
}

/// A wgpu device restricted to one backend, shared by a renderer and the
/// textures it produces.
#[derive(Clone)]
pub struct GpuContext {
    inner: Arc<ContextInner>,
}

impl fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuContext")
            .field("id", &self.id())
            .field("kind", &self.inner.kind)
            .field("adapter", &self.inner.adapter.get_info().name)
            .finish()
    }
}

impl GpuContext {
    /// Open a device on the backend that implements `kind`.
    pub fn new(kind: RendererKind, power_preference: PowerPreference) -> Result<Self, RealizeError> {
        let backends = match kind {
            RendererKind::Gl => wgpu::Backends::GL,
            RendererKind::Vulkan => wgpu::Backends::VULKAN,
            RendererKind::Software => return Err(RealizeError::NoAdapter(kind)),
        };

        let instance = Instance::new(&wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: power_preference.to_wgpu(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| {
            log::debug!("{} adapter request failed: {}", kind, e);
            RealizeError::NoAdapter(kind)
        })?;

        let info = adapter.get_info();
        log::debug!(
            "Using adapter {} ({:?}, driver {})",
            info.name,
            info.backend,
            info.driver
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("rendernode device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                .using_resolution(adapter.limits()),
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| RealizeError::Device(kind, e.to_string()))?;

        Ok(Self {
            inner: Arc::new(ContextInner {
                kind,
                binding: ContextBinding::new(),
                instance,
                adapter,
                device,
                queue,
            }),
        })
    }

    pub fn id(&self) -> ContextId {
        self.inner.binding.id()
    }

    pub fn kind(&self) -> RendererKind {
        self.inner.kind
    }

    /// Bind this context on the calling thread for the guard's lifetime.
    pub fn make_current(&self) -> CurrentGuard<'_> {
        self.inner.binding.bind()
    }

    pub fn is_current(&self) -> bool {
        self.inner.binding.is_current()
    }

    pub fn instance(&self) -> &Instance {
        &self.inner.instance
    }

    pub fn adapter(&self) -> &Adapter {
        &self.inner.adapter
    }

    pub fn device(&self) -> &Device {
        &self.inner.device
    }

    pub fn queue(&self) -> &Queue {
        &self.inner.queue
    }

    pub fn max_texture_size(&self) -> u32 {
        self.inner.device.limits().max_texture_dimension_2d
    }

    pub fn same_context(&self, other: &GpuContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
