//! # xbridge-server
//!
//! Executing side of the render bridge: owns the channel regions, runs the
//! dispatch loop, and keeps the handle registries that map wire tokens to
//! live renderer resources. The rendering backend itself is pluggable
//! through the [`renderer::Renderer`] trait.

pub mod dispatch;
pub mod registry;
pub mod renderer;

pub use dispatch::DispatchLoop;
pub use registry::HandleRegistry;
pub use renderer::{NullRenderer, Renderer};
