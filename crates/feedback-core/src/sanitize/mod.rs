//! HTML sanitization of user-supplied text.

use std::collections::HashSet;

use ammonia::Builder;

/// Elements whose entire content is dropped, not just their tags.
const CLEAN_CONTENT_TAGS: [&str; 6] = ["script", "style", "template", "iframe", "noscript", "object"];

/// Turns untrusted text into plain-safe text.
pub trait Sanitize: Send + Sync {
    /// Remove every piece of active or markup content from `input`.
    fn sanitize(&self, input: &str) -> String;
}

/// Sanitizer that strips all HTML using `ammonia`.
///
/// Each call parses into a fresh document: no tags survive, the bodies of
/// script-like elements are discarded, and remaining text is re-serialized
/// with `<`, `>` and `&` escaped. The output is a fixed point of `sanitize`.
pub struct HtmlSanitizer {
    builder: Builder<'static>,
}

impl HtmlSanitizer {
    /// Create a sanitizer that allows no tags at all.
    #[must_use]
    pub fn new() -> Self {
        let mut builder = Builder::default();
        builder
            .tags(HashSet::new())
            .clean_content_tags(CLEAN_CONTENT_TAGS.into_iter().collect())
            .strip_comments(true);
        Self { builder }
    }
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sanitize for HtmlSanitizer {
    fn sanitize(&self, input: &str) -> String {
        self.builder.clean(input).to_string()
    }
}

impl std::fmt::Debug for HtmlSanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlSanitizer").finish_non_exhaustive()
    }
}
