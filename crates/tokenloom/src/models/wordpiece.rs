//! # WordPiece Model

use crate::models::Vocab;
use crate::types::TokenId;

/// Default continuation prefix for WordPiece subwords.
pub const DEFAULT_CONTINUING_PREFIX: &str = "##";

/// Default cap on fragment length before the whole fragment becomes UNK.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 100;

/// A greedy longest-match WordPiece model.
///
/// Starting at the front of the fragment, repeatedly match the longest
/// vocabulary prefix (with the continuation prefix applied after the first
/// piece) and advance. Any failure makes the whole fragment UNK.
#[derive(Debug)]
pub struct WordPieceModel {
    vocab: Vocab,
    continuing_subword_prefix: String,
    max_input_chars_per_word: usize,
    unk_id: Option<TokenId>,
}

impl WordPieceModel {
    /// Build a new WordPiece model.
    ///
    /// ## Arguments
    /// * `vocab` - The token vocabulary.
    /// * `unk_token` - The unknown-token string, resolved against `vocab`.
    /// * `continuing_subword_prefix` - Marker for non-initial pieces.
    /// * `max_input_chars_per_word` - Byte-length cap before UNK.
    pub fn new(
        vocab: Vocab,
        unk_token: &str,
        continuing_subword_prefix: String,
        max_input_chars_per_word: usize,
    ) -> Self {
        let unk_id = vocab.token_to_id(unk_token);
        Self {
            vocab,
            continuing_subword_prefix,
            max_input_chars_per_word,
            unk_id,
        }
    }

    /// Get the vocabulary.
    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    fn unk(&self) -> Vec<TokenId> {
        self.unk_id.map(|id| vec![id]).unwrap_or_default()
    }

    /// Tokenize one fragment.
    pub fn tokenize(
        &self,
        fragment: &[u8],
    ) -> Vec<TokenId> {
        if fragment.is_empty() {
            return Vec::new();
        }
        let Ok(word) = core::str::from_utf8(fragment) else {
            return self.unk();
        };
        if word.len() > self.max_input_chars_per_word {
            return self.unk();
        }

        let mut ids = Vec::new();
        let mut start = 0;
        while start < word.len() {
            let mut matched = None;
            let mut end = word.len();
            while end > start {
                if word.is_char_boundary(end) {
                    let piece = &word[start..end];
                    let id = if start == 0 {
                        self.vocab.token_to_id(piece)
                    } else {
                        self.vocab
                            .token_to_id(&format!("{}{}", self.continuing_subword_prefix, piece))
                    };
                    if let Some(id) = id {
                        matched = Some((id, end));
                        break;
                    }
                }
                end -= 1;
            }

            match matched {
                Some((id, end)) => {
                    ids.push(id);
                    start = end;
                }
                None => return self.unk(),
            }
        }
        ids
    }
}
