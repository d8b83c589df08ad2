//! wgpu path of the procedural backdrop.
//!
//! - `context` owns instance/adapter/device/surface wiring and reconfigures
//!   the swapchain on resize.
//! - `pipeline` builds the blob pass and the blit that upscales its
//!   density-1 offscreen frame onto the swapchain. Both report shader and
//!   pipeline validation failures as errors.
//! - `uniforms` is the std140 mirror of the shader's uniform block.
//! - `state` glues them together into a [`crate::backdrop::FrameTarget`].

mod context;
mod pipeline;
mod state;
mod uniforms;

pub(crate) use state::GpuState;
