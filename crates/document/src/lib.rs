//! Document store backend for course module state.
//!
//! One document per (course_id, user_id, module_state_key), guarded by a
//! unique compound index. [`DocumentBackend`] talks to the store through the
//! [`StateCollection`] seam, implemented for MongoDB ([`MongoCollection`])
//! and for an in-process map ([`MemoryCollection`]).

mod backend;
mod collection;
mod document;
mod memory;
mod mongo;

pub use backend::DocumentBackend;
pub use collection::StateCollection;
pub use document::StateDocument;
pub use memory::MemoryCollection;
pub use mongo::{MongoCollection, MongoParams, DEFAULT_COLLECTION, DEFAULT_PORT};
