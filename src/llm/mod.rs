//! Chat-completion transport and reply handling.

pub mod generate;
pub mod openai;
pub mod response;
pub mod retry;
pub mod sse;
pub mod transport;

pub use generate::{Echo, generate_message};
pub use openai::{DEFAULT_BASE_URL, OpenAiConfig, OpenAiTransport};
pub use response::clean_message;
pub use transport::{CompletionRequest, CompletionTransport, TokenStream};
