//! Script policy for MizMaster: restricted-library scanning and structural
//! checks of Lua snippets before they leave the assistant.
//!
//! Provides:
//! - **Lexical masking**: blank out comments and string literals while
//!   keeping every line and column in place
//! - **Validation**: denylist scan, bracket nesting, advisory block balance

pub mod lexer;
pub mod validator;

pub use lexer::{mask_comments, mask_literals};
pub use validator::{validate, ValidationResult, RESTRICTED_TOKENS};
