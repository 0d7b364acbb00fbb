//! # Normalizers
//!
//! String-to-string stages applied before pre-tokenization. A normalizer
//! returns `""` if and only if its input was `""`; failure of the
//! underlying Unicode mapper is recovered by returning the input unchanged.

use crate::unicode;

/// Zero-width joiner, remapped to a space by [`Normalizer::Precompiled`].
const ZWJ: char = '\u{200D}';

/// A normalization stage.
#[derive(Debug, Clone)]
pub enum Normalizer {
    /// Unicode NFKC.
    Nfkc,

    /// Prepend a fixed string.
    Prepend {
        /// The string to prepend.
        prepend: String,
    },

    /// Literal substring replacement, left-to-right, advancing past the
    /// replacement.
    Replace {
        /// The literal pattern to search for.
        pattern: String,
        /// The replacement content.
        content: String,
    },

    /// The SentencePiece precompiled char map, reduced to its observed
    /// behavior: NFKC followed by mapping ZWJ to a single space.
    Precompiled,

    /// Unicode lowercase.
    Lowercase,

    /// NFD decomposition with combining marks dropped.
    StripAccents,

    /// The Bert normalization stack.
    Bert {
        /// Collapse whitespace and drop control characters.
        clean_text: bool,
        /// Surround CJK ideographs with spaces.
        handle_chinese_chars: bool,
        /// Drop accents; follows `lowercase` when unset.
        strip_accents: Option<bool>,
        /// Apply Unicode lowercase.
        lowercase: bool,
    },

    /// Apply the contained normalizers in order.
    Sequence(Vec<Normalizer>),
}

impl Normalizer {
    /// Normalize a string.
    ///
    /// ## Arguments
    /// * `text` - The input string.
    ///
    /// ## Returns
    /// The normalized string.
    pub fn normalize(
        &self,
        text: &str,
    ) -> String {
        match self {
            Self::Nfkc => unicode::nfkc(text),
            Self::Prepend { prepend } => format!("{prepend}{text}"),
            Self::Replace { pattern, content } => {
                if pattern.is_empty() {
                    text.to_string()
                } else {
                    text.replace(pattern.as_str(), content)
                }
            }
            Self::Precompiled => {
                let mut out = unicode::nfkc(text);
                if out.contains(ZWJ) {
                    out = out.replace(ZWJ, " ");
                }
                out
            }
            Self::Lowercase => text.to_lowercase(),
            Self::StripAccents => unicode::strip_accents(text),
            Self::Bert {
                clean_text,
                handle_chinese_chars,
                strip_accents,
                lowercase,
            } => bert_normalize(
                text,
                *clean_text,
                *handle_chinese_chars,
                strip_accents.unwrap_or(*lowercase),
                *lowercase,
            ),
            Self::Sequence(normalizers) => {
                let mut out = text.to_string();
                for n in normalizers {
                    out = n.normalize(&out);
                }
                out
            }
        }
    }
}

fn bert_normalize(
    text: &str,
    clean_text: bool,
    handle_chinese_chars: bool,
    strip_accents: bool,
    lowercase: bool,
) -> String {
    let mut out = text.to_string();

    if clean_text {
        let mut cleaned = String::with_capacity(out.len());
        for c in out.chars() {
            match c {
                '\t' | '\n' | '\r' => cleaned.push(' '),
                c if unicode::is_space_separator(c) => cleaned.push(' '),
                '\0' | '\u{FFFD}' => {}
                c if c.is_control() => {}
                c => cleaned.push(c),
            }
        }
        out = cleaned;
    }

    if handle_chinese_chars {
        let mut padded = String::with_capacity(out.len());
        for c in out.chars() {
            if unicode::is_cjk(c) {
                padded.push(' ');
                padded.push(c);
                padded.push(' ');
            } else {
                padded.push(c);
            }
        }
        out = padded;
    }

    if strip_accents {
        let mut stripped = String::with_capacity(out.len());
        for c in out.chars() {
            unicode::strip_accents_char(c, &mut stripped);
        }
        out = stripped;
    }

    if lowercase {
        out = out.to_lowercase();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nfkc() {
        let n = Normalizer::Nfkc;
        assert_eq!(n.normalize("\u{FF28}ello"), "Hello");
        assert_eq!(n.normalize(""), "");
    }

    #[test]
    fn test_prepend() {
        let n = Normalizer::Prepend {
            prepend: "\u{2581}".to_string(),
        };
        assert_eq!(n.normalize("abc"), "\u{2581}abc");
    }

    #[test]
    fn test_replace() {
        let n = Normalizer::Replace {
            pattern: " ".to_string(),
            content: "\u{2581}".to_string(),
        };
        assert_eq!(n.normalize("a b c"), "a\u{2581}b\u{2581}c");

        // Replacement containing the pattern does not loop: the cursor
        // advances past each substitution.
        let n = Normalizer::Replace {
            pattern: "a".to_string(),
            content: "aa".to_string(),
        };
        assert_eq!(n.normalize("aba"), "aabaa");

        let n = Normalizer::Replace {
            pattern: String::new(),
            content: "x".to_string(),
        };
        assert_eq!(n.normalize("ab"), "ab");
    }

    #[test]
    fn test_precompiled() {
        let n = Normalizer::Precompiled;
        assert_eq!(n.normalize("a\u{200D}b"), "a b");
        assert_eq!(n.normalize("plain"), "plain");
    }

    #[test]
    fn test_bert_clean_text() {
        let n = Normalizer::Bert {
            clean_text: true,
            handle_chinese_chars: false,
            strip_accents: Some(false),
            lowercase: false,
        };
        assert_eq!(n.normalize("a\tb\nc\u{A0}d"), "a b c d");
        assert_eq!(n.normalize("a\0b\u{FFFD}c\u{1}d"), "abcd");
    }

    #[test]
    fn test_bert_chinese() {
        let n = Normalizer::Bert {
            clean_text: false,
            handle_chinese_chars: true,
            strip_accents: Some(false),
            lowercase: false,
        };
        assert_eq!(n.normalize("ab\u{4E16}\u{754C}cd"), "ab \u{4E16}  \u{754C} cd");
    }

    #[test]
    fn test_bert_accents_follow_lowercase() {
        // strip_accents unset follows the lowercase flag.
        let n = Normalizer::Bert {
            clean_text: true,
            handle_chinese_chars: true,
            strip_accents: None,
            lowercase: true,
        };
        assert_eq!(n.normalize("Caf\u{E9}"), "cafe");

        let n = Normalizer::Bert {
            clean_text: true,
            handle_chinese_chars: true,
            strip_accents: None,
            lowercase: false,
        };
        assert_eq!(n.normalize("Caf\u{E9}"), "Caf\u{E9}");
    }

    #[test]
    fn test_sequence() {
        let n = Normalizer::Sequence(vec![
            Normalizer::Lowercase,
            Normalizer::Replace {
                pattern: "hello".to_string(),
                content: "hi".to_string(),
            },
        ]);
        assert_eq!(n.normalize("HELLO world"), "hi world");
    }

    #[test]
    fn test_empty_only_for_empty() {
        for n in [
            Normalizer::Nfkc,
            Normalizer::Lowercase,
            Normalizer::StripAccents,
            Normalizer::Precompiled,
        ] {
            assert_eq!(n.normalize(""), "");
            assert!(!n.normalize("x").is_empty());
        }
    }
}
