//! Web content extraction backend.
//!
//! The `web` directive sees the network through the [`PageFetcher`]
//! trait. The shipped implementation pulls a page over blocking HTTP
//! and reduces it to plain text: scripts, styles and markup stripped,
//! whitespace collapsed. That is deliberately crude; a directive that
//! needs structure can post-process through the query service with
//! `parse=readable`.

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use weft_types::ErrorCode;

/// Web fetch error.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (DNS, TLS, timeout, connect).
    #[error("fetch transport failure: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("fetch of '{url}' rejected with status {status}")]
    Status { url: String, status: u16 },
}

impl ErrorCode for FetchError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "FETCH_HTTP",
            Self::Status { .. } => "FETCH_STATUS",
        }
    }

    fn is_recoverable(&self) -> bool {
        // Either may clear on a later attempt; the page cache decides
        // whether to bother.
        true
    }
}

/// Page-content seam for the `web` directive.
pub trait PageFetcher: Send {
    /// Fetches `url` and returns its visible text content.
    ///
    /// # Errors
    ///
    /// [`FetchError`] on transport failure or a non-success status.
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Blocking HTTP fetcher with tag stripping.
pub struct HttpPageFetcher {
    client: reqwest::blocking::Client,
}

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

impl HttpPageFetcher {
    /// Creates a fetcher with a fixed transport timeout.
    ///
    /// # Errors
    ///
    /// [`FetchError::Http`] if the TLS backend cannot initialize.
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpPageFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        debug!(url, "fetching page");
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text()?;
        Ok(extract_text(&body))
    }
}

/// Reduces an HTML document to its visible text.
///
/// Non-HTML input passes through mostly untouched (whitespace
/// collapsed), so fetching a plain-text URL also works.
#[must_use]
pub fn extract_text(html: &str) -> String {
    static SCRIPT_STYLE: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();
    static BLANK_RUNS: OnceLock<Regex> = OnceLock::new();

    let script_style = SCRIPT_STYLE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style|head)\b.*?</(script|style|head)>")
            .expect("static pattern compiles")
    });
    let tag = TAG.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("static pattern compiles"));
    let blank_runs =
        BLANK_RUNS.get_or_init(|| Regex::new(r"\n{3,}").expect("static pattern compiles"));

    let without_blocks = script_style.replace_all(html, "\n");
    let without_tags = tag.replace_all(&without_blocks, "\n");
    let decoded = decode_entities(&without_tags);

    // Trim each line, drop runs of blank lines down to one.
    let trimmed: String = decoded
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    blank_runs.replace_all(&trimmed, "\n\n").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_types::assert_error_codes;

    #[test]
    fn strips_markup_and_scripts() {
        let html = "<html><head><title>t</title></head>\
                    <body><script>alert(1)</script>\
                    <style>p{color:red}</style>\
                    <h1>Title</h1><p>Body &amp; more</p></body></html>";
        let text = extract_text(html);
        assert_eq!(text, "Title\n\nBody & more");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(extract_text("just words"), "just words");
    }

    #[test]
    fn blank_runs_collapse() {
        let html = "<p>a</p>\n\n\n\n<p>b</p>";
        let text = extract_text(html);
        assert_eq!(text, "a\n\nb");
    }

    #[test]
    fn all_error_codes_valid() {
        let errs = vec![FetchError::Status {
            url: "https://example.com".into(),
            status: 404,
        }];
        assert_error_codes(&errs, "FETCH_");
    }
}
