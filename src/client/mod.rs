//! # Dataform Client
//!
//! The seam between workflow orchestration and the remote API.
//!
//! - **DataformClient**: async trait covering compile, invoke, read and list
//! - **InMemoryDataformClient**: scriptable implementation for tests and demos
//!
//! ## Usage
//!
//! ```rust
//! use dataform_core::client::{DataformClient, InMemoryDataformClient};
//! use std::sync::Arc;
//!
//! let client: Arc<dyn DataformClient> = Arc::new(InMemoryDataformClient::new());
//! assert_eq!(client.client_name(), "in-memory");
//! ```

pub mod in_memory;
pub mod traits;

pub use in_memory::{ClientCallCounts, InMemoryDataformClient};
pub use traits::DataformClient;
