//! Per-course backend selection for course module state.
//!
//! [`StorageConfig`] is read from TOML, [`BackendRouter`] turns it into
//! long-lived backends, and [`StateFacade`] forwards each operation to the
//! backend that owns the course.

mod config;
mod facade;
mod router;

pub use config::{EngineConfig, EngineKind, StorageConfig, DEFAULT_DATABASE, DEFAULT_ENGINE};
pub use facade::StateFacade;
pub use router::{BackendRouter, Route};
