pub mod conformance;
mod defaults;
mod error;
mod record;
pub mod timestamp;
mod traits;

pub use defaults::StateDefaults;
pub use error::StorageError;
pub use record::{
    DoneStatus, HistoryEntry, ModuleType, StateKey, StateRecord, HISTORY_TRACKED_TYPES,
};
pub use traits::{HistoryLog, StateStorage};
