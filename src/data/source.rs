use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client as HttpClient;

use crate::error::LoadError;

// ---------------------------------------------------------------------------
// DataSource – opaque byte producer keyed by locator
// ---------------------------------------------------------------------------

/// Anything that can turn a locator into raw tabular bytes.
pub trait DataSource {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, LoadError>;
}

/// Strip a query string / fragment so format detection sees the path only.
pub fn locator_path(locator: &str) -> &str {
    locator
        .split(['?', '#'])
        .next()
        .unwrap_or(locator)
}

/// Lower-cased file extension of a locator, ignoring signed-URL query strings.
pub fn locator_extension(locator: &str) -> String {
    Path::new(locator_path(locator))
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

pub fn is_remote(locator: &str) -> bool {
    let lower = locator.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// Blocking HTTP fetch with a bounded timeout. No retries.
pub struct HttpSource {
    client: HttpClient,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self, LoadError> {
        let client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoadError::unavailable("<http client>", e))?;
        Ok(HttpSource { client })
    }
}

impl DataSource for HttpSource {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, LoadError> {
        let response = self
            .client
            .get(locator)
            .send()
            .map_err(|e| LoadError::unavailable(locator_path(locator), e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::unavailable(
                locator_path(locator),
                format!("HTTP {status}"),
            ));
        }
        let bytes = response
            .bytes()
            .map_err(|e| LoadError::unavailable(locator_path(locator), e))?;
        Ok(bytes.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Local files
// ---------------------------------------------------------------------------

pub struct FileSource;

impl DataSource for FileSource {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, LoadError> {
        let path = locator.strip_prefix("file://").unwrap_or(locator);
        std::fs::read(path).map_err(|e| LoadError::unavailable(locator, e))
    }
}

// ---------------------------------------------------------------------------
// Routing by scheme
// ---------------------------------------------------------------------------

/// Sends `http(s)://` locators over HTTP and everything else to the filesystem.
pub struct AnySource {
    http: HttpSource,
    file: FileSource,
}

impl AnySource {
    pub fn new(timeout: Duration) -> Result<Self, LoadError> {
        Ok(AnySource {
            http: HttpSource::new(timeout)?,
            file: FileSource,
        })
    }
}

impl DataSource for AnySource {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, LoadError> {
        if is_remote(locator) {
            self.http.fetch(locator)
        } else {
            self.file.fetch(locator)
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory (tests, demos)
// ---------------------------------------------------------------------------

/// Fixed locator → bytes map. Unknown locators are unavailable.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    entries: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, locator: &str, content: impl Into<Vec<u8>>) -> Self {
        self.entries.insert(locator.to_string(), content.into());
        self
    }
}

impl DataSource for MemorySource {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, LoadError> {
        self.entries
            .get(locator)
            .cloned()
            .ok_or_else(|| LoadError::unavailable(locator, "no such entry"))
    }
}
