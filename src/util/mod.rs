//! Small helpers shared by extraction, the remote resolvers and the CLI.
//!
//! - **Text**: whitespace collapsing and control-character stripping for
//!   host-provided strings
//! - **Base URLs**: HTTPS enforcement for configurable remote endpoints

mod text;
mod url_validator;

pub use text::{normalize_whitespace, strip_control_chars};
pub use url_validator::{validate_base_url, BaseUrlError};
