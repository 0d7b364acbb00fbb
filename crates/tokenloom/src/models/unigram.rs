//! # Unigram Model
//!
//! Viterbi segmentation over byte positions: pick the path maximizing the
//! sum of per-token log-scores over all segmentations of the fragment.

use crate::models::byte_fallback_token;
use crate::types::{LoomHashMap, TokenId};

/// Log-score used for unknown steps when no unk entry exists.
const FALLBACK_UNK_SCORE: f64 = -10.0;

/// One vocabulary entry: token string and log-score. The entry's index in
/// the model array is its id.
#[derive(Debug, Clone)]
pub struct UnigramEntry {
    /// The token string.
    pub token: String,

    /// The log-probability score.
    pub score: f64,
}

/// A Viterbi-scored Unigram model.
#[derive(Debug)]
pub struct UnigramModel {
    entries: Vec<UnigramEntry>,
    token_ids: LoomHashMap<String, TokenId>,
    unk_id: Option<TokenId>,
    byte_fallback: bool,

    /// Longest token's byte length; bounds the Viterbi window.
    max_token_len: usize,
}

impl UnigramModel {
    /// Build a new Unigram model.
    ///
    /// ## Arguments
    /// * `entries` - The scored vocabulary; index is the token id.
    /// * `unk_id` - The unknown-token id, when present.
    /// * `byte_fallback` - Consult `<0xHH>` entries for unmatched bytes.
    pub fn new(
        entries: Vec<UnigramEntry>,
        unk_id: Option<TokenId>,
        byte_fallback: bool,
    ) -> Self {
        let token_ids = entries
            .iter()
            .enumerate()
            .map(|(id, e)| (e.token.clone(), id as TokenId))
            .collect::<LoomHashMap<String, TokenId>>();
        let max_token_len = entries.iter().map(|e| e.token.len()).max().unwrap_or(1).max(1);

        Self {
            entries,
            token_ids,
            unk_id,
            byte_fallback,
            max_token_len,
        }
    }

    /// The number of vocabulary entries.
    pub fn vocab_size(&self) -> usize {
        self.entries.len()
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
        usize::try_from(id)
            .ok()
            .and_then(|i| self.entries.get(i))
            .map(|e| e.token.as_str())
    }

    fn score_of(
        &self,
        id: TokenId,
    ) -> f64 {
        self.entries
            .get(id as usize)
            .map(|e| e.score)
            .unwrap_or(FALLBACK_UNK_SCORE)
    }

    fn unk_score(&self) -> f64 {
        self.unk_id
            .map(|id| self.score_of(id))
            .unwrap_or(FALLBACK_UNK_SCORE)
    }

    /// Tokenize one fragment.
    pub fn tokenize(
        &self,
        fragment: &[u8],
    ) -> Vec<TokenId> {
        let n = fragment.len();
        if n == 0 {
            return Vec::new();
        }

        let mut best = vec![f64::NEG_INFINITY; n + 1];
        let mut prev = vec![0_usize; n + 1];
        let mut chosen: Vec<Option<TokenId>> = vec![None; n + 1];
        best[0] = 0.0;

        for i in 1..=n {
            let lo = i.saturating_sub(self.max_token_len);
            for j in (lo..i).rev() {
                if best[j] == f64::NEG_INFINITY {
                    continue;
                }

                let candidate = match core::str::from_utf8(&fragment[j..i])
                    .ok()
                    .and_then(|s| self.token_to_id(s))
                {
                    Some(id) => Some((self.score_of(id), Some(id))),
                    None if self.byte_fallback && i - j == 1 => {
                        match self.token_to_id(&byte_fallback_token(fragment[j])) {
                            Some(id) => Some((self.score_of(id), Some(id))),
                            None => Some((self.unk_score(), self.unk_id)),
                        }
                    }
                    None => None,
                };

                if let Some((score, id)) = candidate {
                    let total = best[j] + score;
                    if total > best[i] {
                        best[i] = total;
                        prev[i] = j;
                        chosen[i] = id;
                    }
                }
            }

            if best[i] == f64::NEG_INFINITY {
                // Position unreachable: step back to the start of the
                // preceding UTF-8 character and take an unk step.
                let mut j = i - 1;
                while j > 0 && (fragment[j] & 0xC0) == 0x80 {
                    j -= 1;
                }
                best[i] = best[j] + self.unk_score();
                prev[i] = j;
                chosen[i] = self.unk_id;
            }
        }

        let mut ids = Vec::new();
        let mut i = n;
        while i > 0 {
            if let Some(id) = chosen[i] {
                ids.push(id);
            }
            i = prev[i];
        }
        ids.reverse();

        if let Some(unk) = self.unk_id {
            collapse_consecutive(&mut ids, unk);
        }
        ids
    }
}

/// Merge runs of `unk` into a single occurrence.
fn collapse_consecutive(
    ids: &mut Vec<TokenId>,
    unk: TokenId,
) {
    let mut out = Vec::with_capacity(ids.len());
    for &id in ids.iter() {
        if id == unk && out.last() == Some(&unk) {
            continue;
        }
        out.push(id);
    }
    *ids = out;
}
