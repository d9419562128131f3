//! Synchronization store
//!
//! The single writer of question/answer state. [`SyncStore`] holds the data and
//! the reconciliation rules; [`StoreHandle`] runs it inside an actor task so that
//! router and gateway writes are serialized without locks.

mod manager;
mod messages;
mod sync_store;

pub use manager::StoreHandle;
pub use messages::{ApplyOutcome, StoreCommand, StoreError, StoreEvent, StoreResponse};
pub use sync_store::SyncStore;
