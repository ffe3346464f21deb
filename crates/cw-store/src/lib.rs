#![deny(missing_docs)]
#![doc = "Persisted weighing documents: backup-on-open, nested scheme containers and whole-document saves with a local fallback."]

pub mod store;

pub use store::{next_backup_path, SaveTarget, WeighingStore};
