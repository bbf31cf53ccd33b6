//! Banned-term matching.
//!
//! # Responsibilities
//! - Hold the immutable list of banned terms
//! - Report the first term occurring in a URL or body, ignoring ASCII case
//!
//! # Design Decisions
//! - Plain substring search, no word boundaries: "xSpongeBobx" matches "SpongeBob"
//! - Bodies are matched as raw bytes, so non-UTF-8 content is still filtered

/// Ordered set of banned terms, fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct BannedTermSet {
    /// Terms as configured, used for logging.
    terms: Vec<String>,
    /// Lowercased copies, used for matching.
    folded: Vec<Vec<u8>>,
}

impl BannedTermSet {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let terms: Vec<String> = terms.into_iter().map(Into::into).collect();
        let folded = terms.iter().map(|term| term.as_bytes().to_ascii_lowercase()).collect();
        Self { terms, folded }
    }

    /// First term found in `text`, if any.
    pub fn find(&self, text: impl AsRef<[u8]>) -> Option<&str> {
        let haystack = text.as_ref().to_ascii_lowercase();
        self.folded
            .iter()
            .position(|term| contains(&haystack, term))
            .map(|index| self.terms[index].as_str())
    }

    /// Whether any term occurs in `text`.
    pub fn matches(&self, text: impl AsRef<[u8]>) -> bool {
        self.find(text).is_some()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}
