/// How a cached copy of a remote artifact is revalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// The server issues ETags; a recorded one is echoed in `If-None-Match`
    /// and a `304 Not Modified` counts as a hit.
    Validator,
    /// No server-side validation; only the expected content hash decides.
    HashOnly,
}

/// Everything the fetcher needs to know about one remote artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSource {
    pub url: String,
    /// Expected SHA-1 of the body, when the publisher declares one.
    pub sha1: Option<String>,
    /// Expected body size in bytes, when declared.
    pub size: Option<u64>,
    pub validation: Validation,
}

impl RemoteSource {
    /// A validator-capable source with no declared hash (e.g. the version catalog).
    pub fn validated(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            sha1: None,
            size: None,
            validation: Validation::Validator,
        }
    }

    /// A hash-only source whose content is fully described by its digest.
    pub fn hashed(url: impl Into<String>, sha1: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            url: url.into(),
            sha1: Some(sha1.into()),
            size,
            validation: Validation::HashOnly,
        }
    }

    pub fn with_sha1(mut self, sha1: Option<String>) -> Self {
        self.sha1 = sha1;
        self
    }
}
