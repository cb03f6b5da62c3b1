use std::fmt;

use crate::error::StoreError;

/// Subtree holding persisted sessions
pub const HISTORY_ROOT: &str = "Riwayat";
/// Subtree holding pre-populated measurement templates
pub const TEMPLATES_ROOT: &str = "measurements";

const FORBIDDEN: [char; 5] = ['.', '#', '$', '[', ']'];

/// Validated slash-delimited key path such as `Riwayat/1719822600000`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    /// Parse a path, ignoring leading and trailing slashes
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Err(StoreError::Unknown("store path must not be empty".to_string()));
        }

        let mut path = Self { segments: Vec::new() };
        for segment in trimmed.split('/') {
            path.segments.push(validate_segment(segment)?);
        }
        Ok(path)
    }

    pub fn child(&self, segment: &str) -> Result<Self, StoreError> {
        let mut segments = self.segments.clone();
        segments.push(validate_segment(segment)?);
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment of the path
    pub fn key(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn history() -> Self {
        Self {
            segments: vec![HISTORY_ROOT.to_string()],
        }
    }

    pub fn templates() -> Self {
        Self {
            segments: vec![TEMPLATES_ROOT.to_string()],
        }
    }
}

fn validate_segment(segment: &str) -> Result<String, StoreError> {
    if segment.trim().is_empty() {
        return Err(StoreError::Unknown("store path segments must not be empty".to_string()));
    }
    if let Some(bad) = segment.chars().find(|c| FORBIDDEN.contains(c) || c.is_control() || *c == '/') {
        return Err(StoreError::Unknown(format!(
            "store path segment {:?} contains forbidden character {:?}",
            segment, bad
        )));
    }
    Ok(segment.to_string())
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}
