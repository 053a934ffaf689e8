//! Backend abstraction layer
//!
//! Provides the traits and types that the GPU backends implement.
//!
//! - `vulkan`: records into a host-owned Vulkan command buffer via ash (native only)
//! - `recording`: keeps every command in memory, for headless runs and tests

pub mod recording;
pub mod traits;
pub mod types;

// Vulkan backend is only available on native platforms
#[cfg(not(target_arch = "wasm32"))]
pub mod vulkan;

pub use recording::{RecordedCommand, RecordingBackend};
pub use traits::*;
pub use types::*;
