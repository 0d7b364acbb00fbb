//! # Pre-Tokenizers
//!
//! Stages that consume and produce a [`PreTokenizedString`]: an ordered
//! sequence of byte fragments that are then independently submitted to the
//! model. Fragments are bytes rather than `str` so that byte-level
//! configurations round-trip arbitrary input; stages that need a text view
//! pass non-UTF-8 fragments through unchanged.

use crate::alphabet::ByteAlphabet;
use crate::regex::{RegexPattern, RegexWrapper};
use crate::unicode;

/// The fixed GPT-2 byte-level split pattern.
pub const BYTE_LEVEL_SPLIT_PATTERN: &str =
    r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

/// An ordered sequence of fragments, built per encode call.
#[derive(Debug, Clone, Default)]
pub struct PreTokenizedString {
    /// The fragments, in input order.
    pub splits: Vec<Vec<u8>>,
}

impl PreTokenizedString {
    /// Build a single-fragment sequence from a string.
    pub fn from_text(text: &str) -> Self {
        Self::from_bytes(text.as_bytes().to_vec())
    }

    /// Build a single-fragment sequence from raw bytes.
    pub fn from_bytes(fragment: Vec<u8>) -> Self {
        Self {
            splits: vec![fragment],
        }
    }
}

/// What to do with the matched slice of a `Split`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitBehavior {
    /// Keep the match as its own fragment.
    Isolated,

    /// Drop the match.
    Removed,
}

/// A pre-tokenization stage.
#[derive(Debug, Clone)]
pub enum PreTokenizer {
    /// Regex-driven splitting.
    ///
    /// A `None` regex (pattern failed to compile) makes the stage a no-op
    /// pass-through.
    Split {
        /// The compiled split pattern, if it compiled.
        regex: Option<RegexWrapper>,
        /// Keep the matched slices instead of the slices between them.
        invert: bool,
        /// Disposition of matched slices when not inverted.
        behavior: SplitBehavior,
    },

    /// GPT-2 byte-level remapping, optionally preceded by the fixed split.
    ByteLevel {
        /// The byte-level split pattern; `None` disables the split.
        regex: Option<RegexWrapper>,
    },

    /// Split out ASCII digits.
    Digits {
        /// Isolate every digit as its own fragment.
        individual_digits: bool,
    },

    /// Replace spaces with a visible marker.
    Metaspace {
        /// The marker string, typically "\u{2581}".
        replacement: String,
        /// Prepend a space to the first fragment when absent.
        add_prefix_space: bool,
    },

    /// Bert-style whitespace and punctuation splitting.
    Bert,

    /// Apply the contained pre-tokenizers in order.
    Sequence(Vec<PreTokenizer>),
}

impl PreTokenizer {
    /// Build a `ByteLevel` stage.
    ///
    /// ## Arguments
    /// * `use_regex` - Apply the fixed GPT-2 split before remapping.
    pub fn byte_level(use_regex: bool) -> Self {
        let regex = use_regex
            .then(|| RegexPattern::from(BYTE_LEVEL_SPLIT_PATTERN).compile().ok())
            .flatten();
        Self::ByteLevel { regex }
    }

    /// Apply this stage to a pre-tokenized string.
    pub fn pre_tokenize(
        &self,
        pts: &mut PreTokenizedString,
    ) {
        match self {
            Self::Split {
                regex,
                invert,
                behavior,
            } => {
                if let Some(re) = regex {
                    pts.splits = split_fragments(&pts.splits, re, *invert, *behavior);
                }
            }
            Self::ByteLevel { regex } => {
                if let Some(re) = regex {
                    pts.splits =
                        split_fragments(&pts.splits, re, false, SplitBehavior::Isolated);
                }
                let alphabet = ByteAlphabet::get();
                for fragment in &mut pts.splits {
                    *fragment = alphabet.encode_span(fragment).into_bytes();
                }
            }
            Self::Digits { individual_digits } => {
                pts.splits = split_digits(&pts.splits, *individual_digits);
            }
            Self::Metaspace {
                replacement,
                add_prefix_space,
            } => {
                if *add_prefix_space {
                    if let Some(first) = pts.splits.first_mut() {
                        if !first.is_empty() && first[0] != b' ' {
                            first.insert(0, b' ');
                        }
                    }
                }
                for fragment in &mut pts.splits {
                    *fragment = replace_bytes(fragment, b" ", replacement.as_bytes());
                }
            }
            Self::Bert => {
                pts.splits = split_bert(&pts.splits);
            }
            Self::Sequence(stages) => {
                for stage in stages {
                    stage.pre_tokenize(pts);
                }
            }
        }
    }
}

/// Replace every occurrence of `needle` in `haystack`, left to right,
/// advancing past each replacement.
fn replace_bytes(
    haystack: &[u8],
    needle: &[u8],
    content: &[u8],
) -> Vec<u8> {
    if needle.is_empty() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            out.extend_from_slice(content);
            i += needle.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}

fn split_fragments(
    splits: &[Vec<u8>],
    re: &RegexWrapper,
    invert: bool,
    behavior: SplitBehavior,
) -> Vec<Vec<u8>> {
    let mut next = Vec::with_capacity(splits.len());
    for fragment in splits {
        let Ok(text) = core::str::from_utf8(fragment) else {
            // The match contract is defined on UTF-8 text only.
            next.push(fragment.clone());
            continue;
        };

        let mut cursor = 0;
        while cursor < text.len() {
            let Some((start, end)) = re.search(text, cursor) else {
                next.push(text[cursor..].as_bytes().to_vec());
                break;
            };

            if invert {
                if end > start {
                    next.push(text[start..end].as_bytes().to_vec());
                }
            } else {
                if start > cursor {
                    next.push(text[cursor..start].as_bytes().to_vec());
                }
                if behavior == SplitBehavior::Isolated && end > start {
                    next.push(text[start..end].as_bytes().to_vec());
                }
            }

            cursor = end;
            if start == end {
                // Zero-width match: step to the next char boundary so the
                // loop terminates.
                cursor += 1;
                while cursor < text.len() && !text.is_char_boundary(cursor) {
                    cursor += 1;
                }
            }
        }
    }
    next
}

fn split_digits(
    splits: &[Vec<u8>],
    individual_digits: bool,
) -> Vec<Vec<u8>> {
    let mut next = Vec::with_capacity(splits.len());
    for fragment in splits {
        let mut current = Vec::new();
        for &b in fragment {
            if individual_digits && b.is_ascii_digit() {
                if !current.is_empty() {
                    next.push(core::mem::take(&mut current));
                }
                next.push(vec![b]);
            } else {
                current.push(b);
            }
        }
        if !current.is_empty() {
            next.push(current);
        }
    }
    next
}

fn split_bert(splits: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let mut next = Vec::with_capacity(splits.len());
    for fragment in splits {
        let Ok(text) = core::str::from_utf8(fragment) else {
            next.push(fragment.clone());
            continue;
        };

        let mut current = String::new();
        for c in text.chars() {
            if c.is_whitespace() {
                if !current.is_empty() {
                    next.push(core::mem::take(&mut current).into_bytes());
                }
            } else if unicode::is_bert_punctuation(c) {
                if !current.is_empty() {
                    next.push(core::mem::take(&mut current).into_bytes());
                }
                next.push(c.to_string().into_bytes());
            } else {
                current.push(c);
            }
        }
        if !current.is_empty() {
            next.push(current.into_bytes());
        }
    }
    next
}
