//! # Unicode Property Helpers
//!
//! Thin wrappers over the Unicode property database: NFKC/NFD mapping via
//! `unicode-normalization`, plus the category predicates the Bert stages
//! need. The category checks cover the ranges exercised by tokenizer
//! configurations rather than the full database.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Apply Unicode NFKC.
pub fn nfkc(text: &str) -> String {
    text.nfkc().collect()
}

/// Decompose to NFD and drop combining marks (`Mn`).
pub fn strip_accents(text: &str) -> String {
    text.nfd().filter(|&c| !is_combining_mark(c)).collect()
}

/// Decompose a single character to NFD and drop combining marks.
pub fn strip_accents_char(
    c: char,
    out: &mut String,
) {
    out.extend(c.to_string().nfd().filter(|&m| !is_combining_mark(m)));
}

/// Is this a `Zs`-category space separator?
pub fn is_space_separator(c: char) -> bool {
    matches!(
        c,
        ' ' | '\u{A0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{202F}'
            | '\u{205F}'
            | '\u{3000}'
    )
}

/// Punctuation test for Bert-style splitting.
///
/// Treats the ASCII ranges 33-47, 58-64, 91-96 and 123-126 as punctuation
/// (so characters like `$` and `^` split words, matching the reference),
/// plus the common Unicode `P`-category blocks.
pub fn is_bert_punctuation(c: char) -> bool {
    if c.is_ascii() {
        return c.is_ascii_punctuation();
    }
    let cp = c as u32;
    (0xA1..=0xBF).contains(&cp)
        || (0x2000..=0x206F).contains(&cp)
        || (0x2E00..=0x2E7F).contains(&cp)
        || (0x3000..=0x303F).contains(&cp)
        || (0xFE30..=0xFE4F).contains(&cp)
        || (0xFE50..=0xFE6F).contains(&cp)
        || (0xFF01..=0xFF0F).contains(&cp)
        || (0xFF1A..=0xFF20).contains(&cp)
        || (0xFF3B..=0xFF40).contains(&cp)
        || (0xFF5B..=0xFF65).contains(&cp)
}

/// Is this character in the CJK ideograph blocks?
pub fn is_cjk(c: char) -> bool {
    let cp = c as u32;
    (0x4E00..=0x9FFF).contains(&cp)
        || (0x3400..=0x4DBF).contains(&cp)
        || (0x20000..=0x2A6DF).contains(&cp)
        || (0x2A700..=0x2B73F).contains(&cp)
        || (0x2B740..=0x2B81F).contains(&cp)
        || (0x2B820..=0x2CEAF).contains(&cp)
        || (0xF900..=0xFAFF).contains(&cp)
        || (0x2F800..=0x2FA1F).contains(&cp)
}
