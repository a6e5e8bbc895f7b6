use std::fs;

use once_cell::sync::Lazy;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, REFERER, USER_AGENT};
use reqwest::redirect::Policy;
use tracing::debug;
use url::Url;

use crate::base_uri::set_base_uri;
use crate::charset::resolve_and_decode;
use crate::config::FetchOptions;
use crate::error::{FetchError, Result};

const EXTENSION_NAME: &str = "FetchLinks";
const HOST_PRODUCT: &str = "NewsGator";

static USER_AGENT_STRING: Lazy<String> = Lazy::new(|| {
    format!(
        "{} extension for {}/{} ({})",
        EXTENSION_NAME,
        HOST_PRODUCT,
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_HOMEPAGE"),
    )
});

/// Identifies this extension to web servers; built once per process.
pub fn user_agent() -> &'static str {
    USER_AGENT_STRING.as_str()
}

/// A fetched page, decoded and rebased on the URL it was served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub content: String,
    /// Location after redirects.
    pub final_url: Url,
}

struct RawResponse {
    headers: HeaderMap,
    body: Vec<u8>,
    final_url: Url,
}

/// Retrieves post links. Holds one HTTP client, so a single fetcher can be
/// shared across worker threads.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(options: &FetchOptions) -> Result<Self> {
        let mut builder = Client::builder().redirect(Policy::limited(options.max_redirects));
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Fetch `link_url`, telling the server it was found in `feed_url`.
    pub fn fetch(&self, feed_url: &str, link_url: &str) -> Result<FetchResult> {
        let link = Url::parse(link_url).map_err(|source| FetchError::InvalidUrl {
            url: link_url.to_string(),
            source,
        })?;

        let response = match link.scheme() {
            "http" | "https" => self.get_http(feed_url, link)?,
            "file" => read_file(link)?,
            other => return Err(FetchError::UnsupportedScheme(other.to_string())),
        };

        let text = resolve_and_decode(&response.headers, &response.body);
        let content = set_base_uri(&text, response.final_url.as_str());

        Ok(FetchResult {
            content,
            final_url: response.final_url,
        })
    }

    /// Fetch `link_url` and return only the rewritten HTML.
    pub fn fetch_and_normalize(&self, feed_url: &str, link_url: &str) -> Result<String> {
        self.fetch(feed_url, link_url).map(|result| result.content)
    }

    fn get_http(&self, feed_url: &str, link: Url) -> Result<RawResponse> {
        debug!(link = %link, referer = feed_url, "requesting");

        let mut request = self.client.get(link).header(USER_AGENT, user_agent());
        if !feed_url.is_empty() {
            request = request.header(REFERER, feed_url);
        }
        let resp = request.send()?.error_for_status()?;

        let final_url = resp.url().clone();
        let headers = resp.headers().clone();
        let body = resp.bytes()?.to_vec();
        debug!(url = %final_url, bytes = body.len(), "response received");

        Ok(RawResponse {
            headers,
            body,
            final_url,
        })
    }
}

// Local files carry no headers, so the charset comes from the markup.
fn read_file(link: Url) -> Result<RawResponse> {
    let path = link
        .to_file_path()
        .map_err(|()| FetchError::NotAFilePath(link.clone()))?;
    debug!(path = %path.display(), "reading local file");

    let body = fs::read(&path).map_err(|source| FetchError::Io { path, source })?;

    Ok(RawResponse {
        headers: HeaderMap::new(),
        body,
        final_url: link,
    })
}

/// Fetch one link with default options and return its rewritten HTML.
pub fn fetch_and_normalize(feed_url: &str, link_url: &str) -> Result<String> {
    Fetcher::new(&FetchOptions::default())?.fetch_and_normalize(feed_url, link_url)
}
