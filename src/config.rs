//! Engine configuration.
//!
//! The binary fills this from command-line flags; tests use [`EngineConfig::default`].

/// How service references are recognized inside `*.services.yml` values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReferenceRule {
    /// Sigil that marks a service reference, `@` in Symfony containers.
    pub prefix: String,
    /// Marker after the prefix for optional references (`@?logger`).
    pub optional_marker: Option<char>,
    /// Escaped form of a literal prefix (`@@`), never a reference.
    pub escape: Option<String>,
    /// Whether nested sequences and mappings are scanned (`calls`, keyed arguments).
    pub scan_nested: bool,
}

impl Default for ServiceReferenceRule {
    fn default() -> Self {
        Self {
            prefix: "@".to_string(),
            optional_marker: Some('?'),
            escape: Some("@@".to_string()),
            scan_nested: true,
        }
    }
}

impl ServiceReferenceRule {
    /// Splits a scalar into the referenced service id and its byte offset
    /// inside the scalar.
    pub fn parse<'a>(&self, value: &'a str) -> Option<(&'a str, usize)> {
        if let Some(escape) = &self.escape {
            if value.starts_with(escape.as_str()) {
                return None;
            }
        }
        let mut offset = self.prefix.len();
        let rest = value.strip_prefix(self.prefix.as_str())?;
        let rest = match self.optional_marker {
            Some(marker) if rest.starts_with(marker) => {
                offset += marker.len_utf8();
                &rest[marker.len_utf8()..]
            }
            _ => rest,
        };
        if rest.is_empty() || rest.contains(char::is_whitespace) {
            return None;
        }
        Some((rest, offset))
    }
}

/// Settings shared by the engine, the extractors and the workspace scanner.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub service_reference: ServiceReferenceRule,
    /// Directory names never descended into by the workspace scanner.
    pub excluded_dirs: Vec<String>,
    /// Threads used by the initial scan; `None` uses the global rayon pool.
    pub scan_threads: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            service_reference: ServiceReferenceRule::default(),
            excluded_dirs: ["vendor", "node_modules", "libraries", ".git"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            scan_threads: None,
        }
    }
}
