//! Core library for Crest: descriptors, signature cache, registry client,
//! push engine. Used by the CLI binary; can be reused by other tools
//! (e.g. CI integrations).

pub mod cache;
pub mod config;
pub mod deadline;
pub mod descriptor;
pub mod error;
pub mod http_client;
pub mod push;
pub mod registry;
pub mod utils;

// Re-export main API for CLI
pub use cache::{cache_clean, cache_dir, cache_size_bytes, list_signatures};
pub use config::{command_deadline, default_plain_http, load_config, Config, PushOptions};
pub use deadline::Deadline;
pub use descriptor::{Descriptor, Digest};
pub use error::CrestError;
pub use push::{push_signature, run_push};
pub use registry::{Reference, Repository};
pub use utils::{log, log_error};
