//! HTTP middleware components.
//!
//! Principal resolution runs on every request; the gate runs as a route
//! layer on views that declare requirements.

pub mod gate;
pub mod principal;

pub use gate::{GateLayerState, enforce};
pub use principal::resolve_principal;
