//! # Regex Handles
//!
//! Mixes `regex` and `fancy_regex` behind one wrapper. Most pipeline
//! patterns compile with the faster `regex` engine; the byte-level split
//! pattern needs look-around and falls back to `fancy_regex`.

/// Error wrapper for regex patterns.
#[non_exhaustive]
#[derive(Debug)]
pub enum PatternError {
    /// Error from `regex`.
    Basic(Box<::regex::Error>),

    /// Error from `fancy_regex`.
    Fancy(Box<::fancy_regex::Error>),
}

impl core::fmt::Display for PatternError {
    fn fmt(
        &self,
        f: &mut core::fmt::Formatter<'_>,
    ) -> core::fmt::Result {
        match self {
            Self::Basic(err) => core::fmt::Display::fmt(err, f),
            Self::Fancy(err) => core::fmt::Display::fmt(err, f),
        }
    }
}

impl core::error::Error for PatternError {}

/// An uncompiled regex pattern.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum RegexPattern {
    /// A pattern for the `regex` crate.
    Basic(String),

    /// A pattern for the `fancy_regex` crate.
    Fancy(String),

    /// Tries the `regex` crate first, falling back to `fancy_regex`.
    Adaptive(String),
}

impl<S: AsRef<str>> From<S> for RegexPattern {
    fn from(pattern: S) -> Self {
        Self::Adaptive(pattern.as_ref().to_string())
    }
}

impl RegexPattern {
    /// Get the underlying pattern source.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Basic(pattern) => pattern,
            Self::Fancy(pattern) => pattern,
            Self::Adaptive(pattern) => pattern,
        }
    }

    /// Compile the pattern into a [`RegexWrapper`].
    ///
    /// ## Returns
    /// A `Result` containing the compiled `RegexWrapper` or a `PatternError`.
    pub fn compile(&self) -> Result<RegexWrapper, PatternError> {
        match self {
            Self::Basic(pattern) => ::regex::Regex::new(pattern)
                .map(RegexWrapper::Basic)
                .map_err(|e| PatternError::Basic(e.into())),
            Self::Fancy(pattern) => ::fancy_regex::Regex::new(pattern)
                .map(RegexWrapper::Fancy)
                .map_err(|e| PatternError::Fancy(e.into())),
            Self::Adaptive(pattern) => match ::regex::Regex::new(pattern) {
                Ok(re) => Ok(RegexWrapper::Basic(re)),
                Err(_) => ::fancy_regex::Regex::new(pattern)
                    .map(RegexWrapper::Fancy)
                    .map_err(|e| PatternError::Fancy(e.into())),
            },
        }
    }
}

/// A compiled regex handle.
///
/// Each pipeline stage that needs a pattern owns its handle exclusively;
/// the compiled state is released with the handle.
#[derive(Debug, Clone)]
pub enum RegexWrapper {
    /// Wrapper for `regex::Regex`.
    Basic(::regex::Regex),

    /// Wrapper for `fancy_regex::Regex`.
    Fancy(::fancy_regex::Regex),
}

impl RegexWrapper {
    /// Get the underlying pattern source.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Basic(re) => re.as_str(),
            Self::Fancy(re) => re.as_str(),
        }
    }

    /// Is this backed by `regex::Regex`?
    pub fn is_basic(&self) -> bool {
        matches!(self, Self::Basic(_))
    }

    /// Find the next match at or after `start`.
    ///
    /// ## Arguments
    /// * `haystack` - The text to search in.
    /// * `start` - The byte offset to search from.
    ///
    /// ## Returns
    /// `Some((match_start, match_end))` for the leftmost match, or `None`.
    pub fn search(
        &self,
        haystack: &str,
        start: usize,
    ) -> Option<(usize, usize)> {
        if start > haystack.len() {
            return None;
        }
        match self {
            Self::Basic(re) => re
                .find_at(haystack, start)
                .map(|m| (m.start(), m.end())),
            Self::Fancy(re) => re
                .find_from_pos(haystack, start)
                .ok()
                .flatten()
                .map(|m| (m.start(), m.end())),
        }
    }
}

/// Build an alternation of exact matches, ordered longest-first.
///
/// Longest-first ordering yields maximal-munch matching over the set,
/// which is what added-token dispatch requires.
///
/// ## Arguments
/// * `alts` - The literal alternatives to union.
///
/// ## Returns
/// A `RegexPattern::Basic` containing the union pattern.
pub fn exact_match_union<S: AsRef<str>>(alts: &[S]) -> RegexPattern {
    let mut parts = alts
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>();
    parts.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let escaped = parts
        .into_iter()
        .map(::regex::escape)
        .collect::<Vec<_>>();
    RegexPattern::Basic(escaped.join("|"))
}
