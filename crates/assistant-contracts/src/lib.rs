// Public contracts for the knowledge assistant core.
// This crate defines DTOs shared by the storage, agentic pipeline, and API crates.

pub mod connector;
pub mod converse;
pub mod ingestion_job;
pub mod message;
pub mod model_descriptor;
pub mod oauth_provider;
pub mod tool;

pub use connector::*;
pub use converse::*;
pub use ingestion_job::*;
pub use message::*;
pub use model_descriptor::*;
pub use oauth_provider::*;
pub use tool::*;
