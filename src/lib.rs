//! Fetch the page a feed post links to and splice it into the post.
//!
//! [`charset`] decodes response bytes using the charset named by the headers
//! or the markup, [`base_uri`] points the page's `<base href>` at the URL it
//! came from, and [`fetch`] ties the two to a single GET. [`extension`] holds
//! the host-facing hooks that replace the post placeholder.

pub mod base_uri;
pub mod charset;
pub mod config;
pub mod error;
pub mod extension;
pub mod fetch;
pub mod logging;

pub use crate::{
    base_uri::{rebase_document, set_base_uri},
    charset::{resolve_and_decode, resolve_charset, EncodingDecision},
    config::FetchOptions,
    error::{FetchError, Result},
    extension::{ContentSource, Extension, FetchLinks, PostInfo},
    fetch::{fetch_and_normalize, user_agent, FetchResult, Fetcher},
};
