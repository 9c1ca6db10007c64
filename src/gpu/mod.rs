//! GPU backends on top of wgpu.
//!
//! [`GpuContext`] owns a device restricted to one wgpu backend (GL or
//! Vulkan). Rendering and texture downloads bind the context through a
//! [`CurrentGuard`], so a context is only ever used by one thread at a time.

mod context;
mod flatten;
mod pipeline;
mod renderer;

pub use context::{current_context, ContextBinding, ContextId, CurrentGuard, GpuContext};
pub(crate) use renderer::GpuRenderer;
