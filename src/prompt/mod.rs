//! Budgeted prompt construction.

pub mod compiler;
pub mod message;
pub mod sanitize;
pub mod tokens;

pub use compiler::{
    CompileOptions, CompileWarning, CompiledPrompt, DiffInclusion, FileReport, OverflowPolicy,
    compile,
};
pub use message::{Message, Role};
pub use sanitize::sanitize_text;
pub use tokens::{BpeEstimator, CharEstimator, MESSAGE_OVERHEAD, REQUEST_OVERHEAD, TokenEstimator};
