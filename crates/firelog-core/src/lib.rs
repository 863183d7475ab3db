//! # firelog-core
//!
//! Shared primitives for the firelog log aggregation pipeline.
//!
//! - **Storage**: the [`StorageBackend`] contract plus memory, `object_store`
//!   and deadline-bounded implementations
//! - **Paths**: canonical object layout for aggregates and day exports
//! - **Errors**: storage-level error type and result alias
//! - **Observability**: logging initialization and span helpers
//!
//! ## Example
//!
//! ```rust
//! use firelog_core::prelude::*;
//!
//! let backend = MemoryBackend::new();
//! let path = FirelogPaths::day_export("data", "2025-04-28");
//! assert_eq!(path, "data/2025-04-28.json");
//! # let _ = backend;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod observability;
pub mod paths;
pub mod storage;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::paths::FirelogPaths;
    pub use crate::storage::{
        MemoryBackend, ObjectMeta, ObjectStoreBackend, PutOptions, StorageBackend,
        TimeoutBackend,
    };
}

pub use error::{Error, Result};
pub use observability::{LogFormat, init_logging};
pub use paths::FirelogPaths;
pub use storage::{
    CONTENT_TYPE_JSON, MemoryBackend, ObjectMeta, ObjectStoreBackend, PutOptions,
    StorageBackend, TimeoutBackend,
};
