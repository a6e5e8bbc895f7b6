//! Hooks a feed reader calls while it turns feed items into posts.
//!
//! Only [`Extension::pre_process_item`] does anything: when a post body
//! contains the placeholder it is swapped for the page the post links to.
//! Retrieval failures never reach the host; the placeholder is removed and
//! the post is created anyway.

use std::panic::{self, AssertUnwindSafe};

use tracing::{error, info, info_span};

use crate::config::FetchOptions;
use crate::error::Result;
use crate::fetch::Fetcher;

/// The parts of a feed item the host hands to extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostInfo {
    /// Address of the feed the item came from.
    pub from_addr: String,
    /// The item's link, if it has one.
    pub post_link: Option<String>,
    /// Rendered post body; changes here end up in the created post.
    pub description: String,
}

/// Lifecycle the host drives for every retrieval run.
pub trait Extension {
    /// Called once before a run starts processing items.
    fn begin_retrieve(&self);

    /// Called once after a run has processed every item.
    fn end_retrieve(&self);

    /// Called on a retrieval worker for each new item. Returns whether the
    /// host should create the post.
    fn pre_process_item(&self, post: &mut PostInfo) -> bool;

    /// Called after the post has been created.
    fn post_process_item(&self, post: &PostInfo);
}

/// Produces the HTML that replaces a post's placeholder.
pub trait ContentSource {
    fn content(&self, feed_url: &str, link_url: &str) -> Result<String>;
}

impl ContentSource for Fetcher {
    fn content(&self, feed_url: &str, link_url: &str) -> Result<String> {
        self.fetch_and_normalize(feed_url, link_url)
    }
}

impl<F> ContentSource for F
where
    F: Fn(&str, &str) -> Result<String>,
{
    fn content(&self, feed_url: &str, link_url: &str) -> Result<String> {
        self(feed_url, link_url)
    }
}

/// Replaces the placeholder in post bodies with the linked page.
#[derive(Debug)]
pub struct FetchLinks<S = Fetcher> {
    source: S,
    placeholder: String,
}

impl FetchLinks<Fetcher> {
    pub fn new(options: &FetchOptions) -> Result<Self> {
        Ok(Self::with_source(
            Fetcher::new(options)?,
            options.placeholder.clone(),
        ))
    }
}

impl<S: ContentSource> FetchLinks<S> {
    pub fn with_source(source: S, placeholder: impl Into<String>) -> Self {
        Self {
            source,
            placeholder: placeholder.into(),
        }
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    // Empty on any failure, including a panic while retrieving.
    fn retrieve(&self, post: &PostInfo) -> String {
        let Some(link) = post.post_link.as_deref().filter(|link| !link.is_empty()) else {
            info!("post has no link, removing placeholder");
            return String::new();
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.source.content(&post.from_addr, link)
        }));

        match outcome {
            Ok(Ok(content)) => content,
            Ok(Err(err)) => {
                error!(link, error = ?err, "failed to get content");
                String::new()
            }
            Err(_) => {
                error!(link, "content retrieval panicked");
                String::new()
            }
        }
    }
}

impl<S: ContentSource> Extension for FetchLinks<S> {
    fn begin_retrieve(&self) {
        let _span = info_span!("begin_retrieve").entered();
        info!("no action");
    }

    fn end_retrieve(&self) {
        let _span = info_span!("end_retrieve").entered();
        info!("no action");
    }

    fn pre_process_item(&self, post: &mut PostInfo) -> bool {
        let _span = info_span!("pre_process_item").entered();

        if !self.placeholder.is_empty() && post.description.contains(&self.placeholder) {
            let content = self.retrieve(post);
            post.description = post.description.replace(&self.placeholder, &content);
        }

        true
    }

    fn post_process_item(&self, _post: &PostInfo) {
        let _span = info_span!("post_process_item").entered();
        info!("no action");
    }
}
