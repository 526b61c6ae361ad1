//! Where summarized text comes from: web pages and video transcripts.
//!
//! Both collaborators answer "absent" with `None` rather than an error, and
//! the session turns that into [`BriefError::ContentUnavailable`]. Absent
//! content is never summarized as an empty string.

use crate::chunking::{Chunk, Document, META_SOURCE, META_TITLE, TextSplitter};
use crate::error::{BriefError, Result};
use regex::{Captures, Regex};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Boxed future returned by the collaborator traits.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// True when `url` parses and has both a scheme and a host.
pub fn validate_url(url: &str) -> bool {
    match reqwest::Url::parse(url.trim()) {
        Ok(parsed) => !parsed.scheme().is_empty() && parsed.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

// ── Traits ─────────────────────────────────────────────────────────

/// Fetches the readable text of a web page.
pub trait ContentFetcher: Send + Sync {
    /// `None` on network failure, non-success status or a page with no text.
    fn fetch<'a>(&'a self, url: &'a str) -> SourceFuture<'a, Option<String>>;
}

/// Loads a video transcript as a [`Document`].
pub trait TranscriptLoader: Send + Sync {
    /// `None` when no transcript is available.
    fn load<'a>(&'a self, locator: &'a str) -> SourceFuture<'a, Option<Document>>;

    /// Load, then split against a fixed `chunk_size` token budget.
    fn load_and_split<'a>(
        &'a self,
        locator: &'a str,
        splitter: &'a TextSplitter<'a>,
        model_id: &'a str,
        chunk_size: usize,
        overlap: usize,
    ) -> SourceFuture<'a, Result<Vec<Chunk>>> {
        Box::pin(async move {
            let document = self.load(locator).await.ok_or_else(|| {
                BriefError::ContentUnavailable(format!("no transcript for {locator}"))
            })?;
            splitter.split_text(&document.text, model_id, chunk_size, overlap)
        })
    }
}

// ── HTTP fetcher ───────────────────────────────────────────────────

/// GETs a page with reqwest and extracts its main text.
pub struct HttpContentFetcher {
    client: reqwest::Client,
}

impl HttpContentFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("brief-rs/", env!("CARGO_PKG_VERSION")))
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| BriefError::provider("client_build", e.to_string()))?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Option<String> {
        let start = Instant::now();
        let resp = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!("fetch {url} failed: {e}");
                return None;
            }
        };
        let status = resp.status();
        if !status.is_success() {
            warn!("fetch {url}: HTTP {status}");
            return None;
        }
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("fetch {url}: failed to read body: {e}");
                return None;
            }
        };
        debug!(
            "fetched {url}: HTTP {status} in {:.1}s ({} bytes)",
            start.elapsed().as_secs_f64(),
            body.len()
        );
        extract_text(&body)
    }
}

impl ContentFetcher for HttpContentFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> SourceFuture<'a, Option<String>> {
        Box::pin(self.get(url))
    }
}

// ── HTML extraction ────────────────────────────────────────────────

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>|<noscript\b[^>]*>.*?</noscript\s*>|<!--.*?-->",
    )
    .expect("script/style regex is valid")
});

static CONTAINERS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    ["main", "article", "body"].map(|tag| {
        Regex::new(&format!(r"(?is)<{tag}\b[^>]*>(.*?)</{tag}\s*>"))
            .expect("container regex is valid")
    })
});

static BLOCK_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(?:p|div|h[1-6]|li|tr|section|header|footer|blockquote|pre)\s*>")
        .expect("block regex is valid")
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag regex is valid"));

static NUMERIC_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&#(?:[xX]([0-9a-fA-F]{1,6})|([0-9]{1,7}));").expect("entity regex is valid")
});

static INLINE_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").expect("space regex is valid"));

/// Readable text of an HTML page, or `None` if nothing is left.
///
/// The first `<main>`, else `<article>`, else `<body>` is used; without any
/// of them the whole document is.
pub fn extract_text(html: &str) -> Option<String> {
    let cleaned = SCRIPT_OR_STYLE.replace_all(html, " ");
    let region = CONTAINERS
        .iter()
        .find_map(|re| re.captures(&cleaned).and_then(|c| c.get(1)))
        .map_or(&*cleaned, |m| m.as_str());

    let broken = BLOCK_BREAK.replace_all(region, "\n");
    let stripped = TAG.replace_all(&broken, "");
    let decoded = decode_entities(&stripped);

    let mut out = String::new();
    let mut blank_run = false;
    for line in decoded.lines() {
        let line = INLINE_SPACE.replace_all(line, " ");
        let line = line.trim();
        if line.is_empty() {
            blank_run = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run { "\n\n" } else { "\n" });
        }
        out.push_str(line);
        blank_run = false;
    }
    (!out.is_empty()).then_some(out)
}

fn decode_entities(text: &str) -> String {
    let numeric = NUMERIC_ENTITY.replace_all(text, |caps: &Captures<'_>| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (None, Some(dec)) => dec.as_str().parse().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map_or_else(|| caps[0].to_string(), String::from)
    });
    numeric
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

// ── File transcript loader ─────────────────────────────────────────

/// Reads a transcript saved as plain text. The locator is a file path.
///
/// A first line of the form `# Title` becomes the document title and is
/// not part of the text.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileTranscriptLoader;

impl FileTranscriptLoader {
    pub fn new() -> Self {
        Self
    }

    async fn read(&self, path: &str) -> Option<Document> {
        let raw = match tokio::fs::read_to_string(Path::new(path)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("transcript {path}: {e}");
                return None;
            }
        };
        let (first, rest) = raw.split_once('\n').unwrap_or((raw.as_str(), ""));
        let (title, body) = match first.strip_prefix("# ") {
            Some(title) => (Some(title.trim()), rest),
            None => (None, raw.as_str()),
        };
        let body = body.trim();
        if body.is_empty() {
            return None;
        }
        let mut document = Document::new(body).with_metadata(META_SOURCE, path);
        if let Some(title) = title.filter(|t| !t.is_empty()) {
            document = document.with_metadata(META_TITLE, title);
        }
        Some(document)
    }
}

impl TranscriptLoader for FileTranscriptLoader {
    fn load<'a>(&'a self, locator: &'a str) -> SourceFuture<'a, Option<Document>> {
        Box::pin(self.read(locator))
    }
}
