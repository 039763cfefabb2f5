// Provider registry, model-agnostic chat driver contract, and the tolerant
// structured-output parser. No backend-specific wire code lives here; that
// belongs to assistant-openai / assistant-anthropic / assistant-google.

pub mod driver;
pub mod error;
pub mod json_extract;
pub mod model_catalog;
pub mod registry;
pub mod tokenizer;

pub use driver::{ConverseParams, ConverseStream, Driver};
pub use error::{CoreError, Result};
pub use registry::{EnvConfig, Registry};
