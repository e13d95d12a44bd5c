//! Parse and validate `chumak.toml` and the per-source-set state snapshot.

pub mod manifest;
pub mod snapshot;

pub use manifest::Manifest;
pub use snapshot::Snapshot;
