//! # Models
//!
//! A model maps a single pre-token fragment to a sequence of ids, and
//! exposes the token/id lookups the façade delegates to.

pub mod bpe;
pub mod unigram;
pub mod wordpiece;

pub use bpe::{BpeModel, MergeTable};
pub use unigram::{UnigramEntry, UnigramModel};
pub use wordpiece::WordPieceModel;

use crate::types::{LoomHashMap, TokenId};

/// Format a raw byte as its byte-fallback token, e.g. `<0xC3>`.
pub(crate) fn byte_fallback_token(byte: u8) -> String {
    format!("<0x{byte:02X}>")
}

/// A bijective token-string to id table with its inverse.
#[derive(Debug, Clone, Default)]
pub struct Vocab {
    token_ids: LoomHashMap<String, TokenId>,
    id_tokens: LoomHashMap<TokenId, String>,
}

impl FromIterator<(String, TokenId)> for Vocab {
    fn from_iter<I: IntoIterator<Item = (String, TokenId)>>(iter: I) -> Self {
        let mut vocab = Self::default();
        for (token, id) in iter {
            vocab.insert(token, id);
        }
        vocab
    }
}

impl Vocab {
    /// Insert an entry, replacing any previous binding for the token.
    pub fn insert(
        &mut self,
        token: String,
        id: TokenId,
    ) {
        self.id_tokens.insert(id, token.clone());
        self.token_ids.insert(token, id);
    }

    /// Look up the id for a token.
    pub fn token_to_id(
        &self,
        token: &str,
    ) -> Option<TokenId> {
        self.token_ids.get(token).copied()
    }

    /// Look up the token for an id.
    pub fn id_to_token(
        &self,
        id: TokenId,
    ) -> Option<&str> {
        self.id_tokens.get(&id).map(String::as_str)
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.token_ids.len()
    }

    /// Is the table empty?
    pub fn is_empty(&self) -> bool {
        self.token_ids.is_empty()
    }

    /// Iterate over all ids.
    pub fn ids(&self) -> impl Iterator<Item = TokenId> + '_ {
        self.id_tokens.keys().copied()
    }
}

/// A tokenization model.
#[derive(Debug)]
pub enum Model {
    /// Merge-rank byte-pair encoding.
    Bpe(BpeModel),

    /// Greedy longest-match WordPiece.
    WordPiece(WordPieceModel),

    /// Viterbi-scored Unigram.
    Unigram(UnigramModel),
}

impl Model {
    /// Map a fragment to a sequence of ids.
    pub fn tokenize(
        &self,
        fragment: &[u8],
    ) -> Vec<TokenId> {
        match self {
            Self::Bpe(m) => m.tokenize(fragment),
            Self::WordPiece(m) => m.tokenize(fragment),
            Self::Unigram(m) => m.tokenize(fragment),
        }
    }

    /// Look up the id for a token.
    pub fn token_to_id(
        &self,
        token: &str,
    ) -> Option<TokenId> {
        match self {
            Self::Bpe(m) => m.vocab().token_to_id(token),
            Self::WordPiece(m) => m.vocab().token_to_id(token),
            Self::Unigram(m) => m.token_to_id(token),
        }
    }

    /// Look up the token for an id.
    pub fn id_to_token(
        &self,
        id: TokenId,
    ) -> Option<&str> {
        match self {
            Self::Bpe(m) => m.vocab().id_to_token(id),
            Self::WordPiece(m) => m.vocab().id_to_token(id),
            Self::Unigram(m) => m.id_to_token(id),
        }
    }

    /// The number of vocabulary entries.
    pub fn vocab_size(&self) -> usize {
        match self {
            Self::Bpe(m) => m.vocab().len(),
            Self::WordPiece(m) => m.vocab().len(),
            Self::Unigram(m) => m.vocab_size(),
        }
    }
}
