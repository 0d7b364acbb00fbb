//! # Tokenizer Façade
//!
//! Owns one instance of each pipeline stage (any may be absent) plus the
//! added-token table, the special-token ids, and the optional chat
//! template. Constructed by the loader; logically immutable afterwards
//! except for the chat template and the clean-up-spaces flag.

use tracing::warn;

use crate::added::{AddedVocab, Segment};
use crate::chat::ChatTemplate;
use crate::decoders::Decoder;
use crate::models::Model;
use crate::normalizers::Normalizer;
use crate::pretokenizers::{PreTokenizedString, PreTokenizer};
use crate::processors::TemplateProcessing;
use crate::types::{TokenId, NO_TOKEN};

/// The structural special-token ids, each optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecialTokens {
    /// Padding token id.
    pub pad: Option<TokenId>,

    /// Beginning-of-sequence token id.
    pub bos: Option<TokenId>,

    /// End-of-sequence token id.
    pub eos: Option<TokenId>,

    /// Unknown token id.
    pub unk: Option<TokenId>,
}

/// A loaded tokenization pipeline.
pub struct Tokenizer {
    pub(crate) normalizer: Option<Normalizer>,
    pub(crate) pre_tokenizer: Option<PreTokenizer>,
    pub(crate) model: Option<Model>,
    pub(crate) post_processor: Option<TemplateProcessing>,
    pub(crate) decoder: Decoder,
    pub(crate) added: AddedVocab,
    pub(crate) specials: SpecialTokens,
    pub(crate) chat_template: Option<ChatTemplate>,
}

impl Tokenizer {
    /// Encode text into ids.
    ///
    /// ## Arguments
    /// * `text` - The input string.
    /// * `add_special_tokens` - Frame the result with bos/eos when present.
    ///
    /// ## Returns
    /// The ordered id sequence.
    pub fn encode(
        &self,
        text: &str,
        add_special_tokens: bool,
    ) -> Vec<TokenId> {
        self.encode_bytes(text.as_bytes(), add_special_tokens)
    }

    /// Encode raw bytes into ids.
    ///
    /// Byte-level configurations round-trip arbitrary bytes; for other
    /// configurations non-UTF-8 input degrades to byte-fallback or unk
    /// handling in the model.
    pub fn encode_bytes(
        &self,
        input: &[u8],
        add_special_tokens: bool,
    ) -> Vec<TokenId> {
        if input.is_empty() {
            return Vec::new();
        }

        let mut ids = Vec::new();
        if add_special_tokens {
            if let Some(bos) = self.specials.bos {
                ids.push(bos);
            }
        }

        match core::str::from_utf8(input) {
            Ok(text) => {
                for unit in self.added.split(text) {
                    match unit {
                        Segment::Added(content) => {
                            if let Some(id) = self.lookup_token(content) {
                                ids.push(id);
                            }
                        }
                        Segment::Text(text) => self.encode_unit(text.as_bytes(), &mut ids),
                    }
                }
            }
            // Added-token matching is defined on text; raw bytes go
            // straight to the pipeline as one unit.
            Err(_) => self.encode_unit(input, &mut ids),
        }

        if add_special_tokens {
            if let Some(eos) = self.specials.eos {
                ids.push(eos);
            }
        }
        ids
    }

    /// Run one non-added unit through normalize, pre-tokenize, model.
    fn encode_unit(
        &self,
        unit: &[u8],
        ids: &mut Vec<TokenId>,
    ) {
        let normalized: Vec<u8> = match (core::str::from_utf8(unit), &self.normalizer) {
            (Ok(text), Some(normalizer)) => normalizer.normalize(text).into_bytes(),
            _ => unit.to_vec(),
        };
        if normalized.is_empty() {
            return;
        }

        let mut pts = PreTokenizedString::from_bytes(normalized);
        if let Some(pre_tokenizer) = &self.pre_tokenizer {
            pre_tokenizer.pre_tokenize(&mut pts);
        }

        let Some(model) = &self.model else { return };
        for fragment in &pts.splits {
            ids.extend(model.tokenize(fragment));
        }
    }

    /// Decode ids back into a string.
    ///
    /// Invalid UTF-8 in the decoded bytes is replaced; use
    /// [`decode_bytes`](Self::decode_bytes) for byte-exact output.
    pub fn decode(
        &self,
        ids: &[TokenId],
        skip_special_tokens: bool,
    ) -> String {
        String::from_utf8_lossy(&self.decode_bytes(ids, skip_special_tokens)).into_owned()
    }

    /// Decode ids back into raw bytes.
    pub fn decode_bytes(
        &self,
        ids: &[TokenId],
        skip_special_tokens: bool,
    ) -> Vec<u8> {
        let mut tokens: Vec<Vec<u8>> = Vec::with_capacity(ids.len());
        for &id in ids {
            if skip_special_tokens && self.added.is_special(id) {
                continue;
            }
            if let Some(token) = self.lookup_id(id) {
                if !token.is_empty() {
                    tokens.push(token.as_bytes().to_vec());
                }
            }
        }
        self.decoder.decode(&mut tokens);
        tokens.concat()
    }

    fn lookup_token(
        &self,
        token: &str,
    ) -> Option<TokenId> {
        self.added
            .token_to_id(token)
            .or_else(|| self.model.as_ref().and_then(|m| m.token_to_id(token)))
    }

    fn lookup_id(
        &self,
        id: TokenId,
    ) -> Option<&str> {
        self.added
            .id_to_token(id)
            .or_else(|| self.model.as_ref().and_then(|m| m.id_to_token(id)))
    }

    /// Look up a token's id, `-1` on miss.
    pub fn token_to_id(
        &self,
        token: &str,
    ) -> TokenId {
        self.lookup_token(token).unwrap_or(NO_TOKEN)
    }

    /// Look up an id's token, `""` on miss.
    pub fn id_to_token(
        &self,
        id: TokenId,
    ) -> String {
        self.lookup_id(id).unwrap_or_default().to_string()
    }

    /// The padding token id, `-1` when absent.
    pub fn pad_token_id(&self) -> TokenId {
        self.specials.pad.unwrap_or(NO_TOKEN)
    }

    /// The beginning-of-sequence token id, `-1` when absent.
    pub fn bos_token_id(&self) -> TokenId {
        self.specials.bos.unwrap_or(NO_TOKEN)
    }

    /// The end-of-sequence token id, `-1` when absent.
    pub fn eos_token_id(&self) -> TokenId {
        self.specials.eos.unwrap_or(NO_TOKEN)
    }

    /// The unknown token id, `-1` when absent.
    pub fn unk_token_id(&self) -> TokenId {
        self.specials.unk.unwrap_or(NO_TOKEN)
    }

    /// The post-processing template, when one was declared.
    pub fn post_processor(&self) -> Option<&TemplateProcessing> {
        self.post_processor.as_ref()
    }

    /// The number of model vocabulary entries.
    pub fn vocab_size(&self) -> usize {
        self.model.as_ref().map(Model::vocab_size).unwrap_or(0)
    }

    /// Set the chat template. Called once after load, before first use.
    pub fn set_chat_template(
        &mut self,
        template: &str,
    ) {
        match ChatTemplate::new(template) {
            Ok(handle) => self.chat_template = Some(handle),
            Err(e) => {
                warn!("rejected chat template: {e}");
                self.chat_template = None;
            }
        }
    }

    /// Set the clean-up-spaces flag. Called once after load, before first
    /// use; propagates into every WordPiece decoder.
    pub fn set_clean_up_tokenization_spaces(
        &mut self,
        flag: bool,
    ) {
        self.decoder.set_wordpiece_cleanup(flag);
    }

    /// Format messages through the chat template.
    ///
    /// ## Arguments
    /// * `messages` - `(role, content)` pairs.
    /// * `add_generation_prompt` - Append the assistant prompt frame.
    ///
    /// ## Returns
    /// The formatted text, or `""` when no template is set or rendering
    /// fails.
    pub fn apply_chat_template<R, C>(
        &self,
        messages: &[(R, C)],
        add_generation_prompt: bool,
    ) -> String
    where
        R: AsRef<str>,
        C: AsRef<str>,
    {
        let messages = messages
            .iter()
            .map(|(role, content)| {
                serde_json::json!({
                    "role": role.as_ref(),
                    "content": content.as_ref(),
                })
            })
            .collect::<Vec<_>>();
        self.render_chat(serde_json::Value::Array(messages), add_generation_prompt)
    }

    /// Format a JSON array of `{role, content}` messages through the chat
    /// template. Non-array documents yield `""`.
    pub fn apply_chat_template_json(
        &self,
        json_messages: &str,
        add_generation_prompt: bool,
    ) -> String {
        let Ok(messages) = serde_json::from_str::<serde_json::Value>(json_messages) else {
            return String::new();
        };
        if !messages.is_array() {
            return String::new();
        }
        self.render_chat(messages, add_generation_prompt)
    }

    fn render_chat(
        &self,
        messages: serde_json::Value,
        add_generation_prompt: bool,
    ) -> String {
        let Some(template) = &self.chat_template else {
            return String::new();
        };

        let bos = self
            .specials
            .bos
            .map(|id| self.id_to_token(id))
            .unwrap_or_default();
        let eos = self
            .specials
            .eos
            .map(|id| self.id_to_token(id))
            .unwrap_or_default();

        match template.render(&messages, &bos, &eos, add_generation_prompt) {
            Ok(text) => text,
            Err(e) => {
                warn!("chat template render failed: {e}");
                String::new()
            }
        }
    }
}
