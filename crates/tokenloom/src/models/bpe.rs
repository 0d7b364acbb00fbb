//! # Byte-Pair Encoding Model
//!
//! Merge-rank BPE: seed a fragment as per-character (or per-byte) ids,
//! then repeatedly merge the adjacent pair with the smallest rank until no
//! ranked pair remains. The linear scan is O(n^2) per fragment, which is
//! adequate for pre-tokenized fragment lengths.

use parking_lot::Mutex;

use crate::alphabet::ByteAlphabet;
use crate::models::{byte_fallback_token, Vocab};
use crate::types::{LoomHashMap, TokenId};

/// Ordered pair-to-rank merge table.
pub type MergeTable = LoomHashMap<(TokenId, TokenId), u32>;

/// A merge-rank BPE model.
pub struct BpeModel {
    vocab: Vocab,
    merges: MergeTable,

    /// Remap fragment bytes through the byte alphabet before lookup.
    ///
    /// Set only when the configuration expects byte-level I/O but no
    /// ByteLevel pre-tokenizer already remapped the input.
    use_byte_level: bool,

    /// Emit `<0xHH>` tokens for characters missing from the vocabulary.
    byte_fallback: bool,

    /// Per-fragment tokenization cache. Grows monotonically; synchronized
    /// so a loaded tokenizer stays `Send + Sync`.
    cache: Mutex<LoomHashMap<Vec<u8>, Vec<TokenId>>>,
}

impl core::fmt::Debug for BpeModel {
    fn fmt(
        &self,
        f: &mut core::fmt::Formatter<'_>,
    ) -> core::fmt::Result {
        f.debug_struct("BpeModel")
            .field("vocab_size", &self.vocab.len())
            .field("merges", &self.merges.len())
            .field("use_byte_level", &self.use_byte_level)
            .field("byte_fallback", &self.byte_fallback)
            .finish()
    }
}

impl BpeModel {
    /// Build a new BPE model.
    ///
    /// ## Arguments
    /// * `vocab` - The token vocabulary.
    /// * `merges` - The pair-to-rank merge table.
    /// * `use_byte_level` - Remap input bytes through the byte alphabet.
    /// * `byte_fallback` - Emit `<0xHH>` tokens for missing characters.
    pub fn new(
        vocab: Vocab,
        merges: MergeTable,
        use_byte_level: bool,
        byte_fallback: bool,
    ) -> Self {
        Self {
            vocab,
            merges,
            use_byte_level,
            byte_fallback,
            cache: Mutex::new(LoomHashMap::default()),
        }
    }

    /// Get the vocabulary.
    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    /// Tokenize one fragment.
    pub fn tokenize(
        &self,
        fragment: &[u8],
    ) -> Vec<TokenId> {
        if fragment.is_empty() {
            return Vec::new();
        }

        if let Some(hit) = self.cache.lock().get(fragment) {
            return hit.clone();
        }

        let mut ids = if self.use_byte_level {
            self.seed_byte_level(fragment)
        } else {
            self.seed_code_points(fragment)
        };
        self.merge(&mut ids);

        self.cache.lock().insert(fragment.to_vec(), ids.clone());
        ids
    }

    /// Seed ids by remapping each raw byte through the byte alphabet.
    fn seed_byte_level(
        &self,
        fragment: &[u8],
    ) -> Vec<TokenId> {
        let alphabet = ByteAlphabet::get();
        let mut ids = Vec::with_capacity(fragment.len());
        let mut buf = [0_u8; 4];
        for &b in fragment {
            let token = alphabet.char_for(b).encode_utf8(&mut buf);
            if let Some(id) = self.vocab.token_to_id(token) {
                ids.push(id);
            }
        }
        ids
    }

    /// Seed ids by code point, with `<0xHH>` byte fallback on misses.
    fn seed_code_points(
        &self,
        fragment: &[u8],
    ) -> Vec<TokenId> {
        let mut ids = Vec::with_capacity(fragment.len());
        let mut offset = 0;
        while offset < fragment.len() {
            match core::str::from_utf8(&fragment[offset..]) {
                Ok(chunk) => {
                    self.seed_chars(chunk, &mut ids);
                    break;
                }
                Err(e) if e.valid_up_to() > 0 => {
                    let valid = e.valid_up_to();
                    // Safe: `valid_up_to` bytes are known-valid UTF-8.
                    let chunk = core::str::from_utf8(&fragment[offset..offset + valid])
                        .unwrap_or_default();
                    self.seed_chars(chunk, &mut ids);
                    offset += valid;
                }
                Err(_) => {
                    if self.byte_fallback {
                        let token = byte_fallback_token(fragment[offset]);
                        if let Some(id) = self.vocab.token_to_id(&token) {
                            ids.push(id);
                        }
                    }
                    offset += 1;
                }
            }
        }
        ids
    }

    fn seed_chars(
        &self,
        chunk: &str,
        ids: &mut Vec<TokenId>,
    ) {
        let mut buf = [0_u8; 4];
        for c in chunk.chars() {
            let token = c.encode_utf8(&mut buf);
            if let Some(id) = self.vocab.token_to_id(token) {
                ids.push(id);
            } else if self.byte_fallback {
                for &b in token.as_bytes() {
                    if let Some(id) = self.vocab.token_to_id(&byte_fallback_token(b)) {
                        ids.push(id);
                    }
                }
            }
        }
    }

    /// Greedy merge: smallest rank first, ties broken leftmost.
    fn merge(
        &self,
        ids: &mut Vec<TokenId>,
    ) {
        while ids.len() > 1 {
            let mut best: Option<(u32, usize)> = None;
            for i in 0..ids.len() - 1 {
                if let Some(&rank) = self.merges.get(&(ids[i], ids[i + 1])) {
                    if best.is_none_or(|(r, _)| rank < r) {
                        best = Some((rank, i));
                    }
                }
            }

            let Some((_, i)) = best else { break };

            let merged = format!(
                "{}{}",
                self.vocab.id_to_token(ids[i]).unwrap_or_default(),
                self.vocab.id_to_token(ids[i + 1]).unwrap_or_default(),
            );
            let Some(merged_id) = self.vocab.token_to_id(&merged) else {
                break;
            };

            ids[i] = merged_id;
            ids.remove(i + 1);
        }
    }
}
