//! Feed filtering by publish year, duration, keywords and tags.
//!
//! The pipeline extracts typed records from loosely structured feed items
//! ([`extract`]), classifies them ([`filter`]) and hides what does not
//! match, while [`resolve`] looks up missing publish years through a
//! TTL-bounded cache and [`settings`] keeps one configuration per
//! browsing context.

pub mod config;
pub mod extract;
pub mod filter;
pub mod node;
pub mod pipeline;
pub mod resolve;
pub mod selector;
pub mod service;
pub mod settings;
pub mod storage;
pub mod text;
pub mod util;
