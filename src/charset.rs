//! Charset sniffing for fetched pages.
//!
//! The charset comes from the `content-type` header when it names one, then
//! from a `charset=` marker anywhere in the body, and otherwise defaults to
//! ASCII. Names that no encoding answers to also fall back to ASCII.

use encoding_rs::{Encoding, WINDOWS_1252};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use tracing::{debug, warn};

const CHARSET_MARKER: &str = "charset=";

/// Where a charset name was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharsetSource {
    /// The `content-type` response header.
    Header,
    /// A `charset=` marker in the body.
    Meta,
    /// Nothing named a charset.
    Default,
}

/// Encoding used to turn a body into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// Seven-bit ASCII; bytes above 0x7F decode as `?`.
    Ascii,
    /// ISO-8859-1; every byte maps to the code point of the same value.
    Latin1,
    /// Any other encoding `encoding_rs` knows by label.
    Known(&'static Encoding),
}

// WHATWG folds these into windows-1252; they are decoded as named instead.
const ASCII_LABELS: &[&str] = &["ansi_x3.4-1968", "ascii", "us-ascii"];
const LATIN1_LABELS: &[&str] = &[
    "cp819",
    "csisolatin1",
    "ibm819",
    "iso-8859-1",
    "iso-ir-100",
    "iso8859-1",
    "iso88591",
    "iso_8859-1",
    "iso_8859-1:1987",
    "l1",
    "latin1",
];

impl TextEncoding {
    /// Canonical name of the encoding.
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Ascii => "us-ascii",
            TextEncoding::Latin1 => "iso-8859-1",
            TextEncoding::Known(encoding) => encoding.name(),
        }
    }
}

/// Outcome of charset resolution for one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingDecision {
    /// Charset name as found, untrimmed. `None` when nothing named one.
    pub charset: Option<String>,
    pub source: CharsetSource,
    pub encoding: TextEncoding,
    /// The named charset had no matching encoding and ASCII was used instead.
    pub unrecognized: bool,
}

/// Decode a response body using the charset its headers or markup declare.
pub fn resolve_and_decode(headers: &HeaderMap, body: &[u8]) -> String {
    let decision = resolve_charset(headers, body);
    decode(&decision, body)
}

/// Pick the encoding for `body` without decoding it.
pub fn resolve_charset(headers: &HeaderMap, body: &[u8]) -> EncodingDecision {
    let (charset, source) = if let Some(charset) = header_charset(headers) {
        debug!(charset = %charset, "charset from content-type header");
        (Some(charset), CharsetSource::Header)
    } else if let Some(charset) = meta_charset(body) {
        debug!(charset = %charset, "charset from document body");
        (Some(charset), CharsetSource::Meta)
    } else {
        (None, CharsetSource::Default)
    };

    let (encoding, unrecognized) = match charset.as_deref().map(|name| (name, lookup(name))) {
        None => (TextEncoding::Ascii, false),
        Some((_, Some(encoding))) => (encoding, false),
        Some((name, None)) => {
            warn!(charset = %name, "unrecognized charset, decoding as ascii");
            (TextEncoding::Ascii, true)
        }
    };

    EncodingDecision {
        charset,
        source,
        encoding,
        unrecognized,
    }
}

/// Decode `body` with the encoding picked by [`resolve_charset`].
///
/// A byte-order mark at the start of the body takes precedence over the
/// decision.
pub fn decode(decision: &EncodingDecision, body: &[u8]) -> String {
    match decision.encoding {
        TextEncoding::Known(encoding) => encoding.decode(body).0.into_owned(),
        TextEncoding::Latin1 => match Encoding::for_bom(body) {
            Some((encoding, _)) => encoding.decode(body).0.into_owned(),
            None => encoding_rs::mem::decode_latin1(body).into_owned(),
        },
        TextEncoding::Ascii => match Encoding::for_bom(body) {
            Some((encoding, _)) => encoding.decode(body).0.into_owned(),
            None => body
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { '?' })
                .collect(),
        },
    }
}

// Everything after the first `charset=` in the content-type value.
fn header_charset(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_TYPE)?;
    let value = String::from_utf8_lossy(value.as_bytes());
    let index = value.find(CHARSET_MARKER)?;
    Some(value[index + CHARSET_MARKER.len()..].to_string())
}

// Substring scan for `charset=` up to the next double quote, as found in
// `<meta http-equiv="Content-Type" content="text/html; charset=utf-8">`.
// A quote right after the marker opens the value and is skipped.
fn meta_charset(body: &[u8]) -> Option<String> {
    let (text, _) = WINDOWS_1252.decode_without_bom_handling(body);
    let start = text.find(CHARSET_MARKER)? + CHARSET_MARKER.len();
    let rest = &text[start..];

    let skip = usize::from(rest.starts_with('"'));
    let end = rest[skip..].find('"')? + skip;

    Some(rest[skip..=end].trim_end_matches(&['>', '"'][..]).to_string())
}

// Names are matched verbatim: surrounding whitespace makes a name unknown.
fn lookup(name: &str) -> Option<TextEncoding> {
    if name.is_empty() || name.trim() != name {
        return None;
    }

    let label = name.to_ascii_lowercase();
    if ASCII_LABELS.contains(&label.as_str()) {
        return Some(TextEncoding::Ascii);
    }
    if LATIN1_LABELS.contains(&label.as_str()) {
        return Some(TextEncoding::Latin1);
    }
    Encoding::for_label_no_replacement(name.as_bytes()).map(TextEncoding::Known)
}
