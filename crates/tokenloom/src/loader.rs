//! # Declarative Loading
//!
//! Walks a `tokenizer.json` tree and materializes the pipeline graph.
//! Unknown stage types are skipped; stage patterns that fail to compile
//! become no-op stages. Only a missing or unparseable document is an
//! error.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::added::{AddedToken, AddedVocab};
use crate::decoders::Decoder;
use crate::errors::{LoomError, LoomResult};
use crate::models::{
    BpeModel,
    MergeTable,
    Model,
    UnigramEntry,
    UnigramModel,
    Vocab,
    WordPieceModel,
};
use crate::normalizers::Normalizer;
use crate::pretokenizers::{PreTokenizer, SplitBehavior};
use crate::processors::{TemplateProcessing, TemplateStep};
use crate::regex::RegexPattern;
use crate::tokenizer::{SpecialTokens, Tokenizer};
use crate::types::{TokenId, NO_TOKEN};

/// Load a tokenizer from a model directory.
///
/// Reads the mandatory `tokenizer.json` and, when present,
/// `tokenizer_config.json` (chat template, clean-up flag, special-token
/// overrides).
///
/// ## Arguments
/// * `dir` - The directory containing the documents.
///
/// ## Returns
/// A `Result` containing the loaded tokenizer.
pub fn from_pretrained<P: AsRef<Path>>(dir: P) -> LoomResult<Tokenizer> {
    let dir = dir.as_ref();

    let path = dir.join("tokenizer.json");
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(LoomError::MissingFile { path });
        }
        Err(e) => return Err(e.into()),
    };
    let doc: Value =
        serde_json::from_str(&content).map_err(|e| LoomError::MalformedJson(e.to_string()))?;

    let config = fs::read_to_string(dir.join("tokenizer_config.json"))
        .ok()
        .and_then(|c| serde_json::from_str::<Value>(&c).ok());

    let mut tokenizer = build(&doc)?;
    if let Some(config) = config {
        apply_config(&mut tokenizer, &config);
    }
    Ok(tokenizer)
}

/// Load a tokenizer from an in-memory `tokenizer.json` document.
pub fn from_json_str(content: &str) -> LoomResult<Tokenizer> {
    let doc: Value =
        serde_json::from_str(content).map_err(|e| LoomError::MalformedJson(e.to_string()))?;
    build(&doc)
}

fn build(doc: &Value) -> LoomResult<Tokenizer> {
    let pre_tokenizer_node = doc.get("pre_tokenizer");

    // Byte-level wiring: the model remaps bytes itself only when some
    // stage expects byte-level I/O and no ByteLevel pre-tokenizer already
    // remapped the input (which would double-remap).
    let pre_tokenizer_is_byte_level = contains_byte_level(pre_tokenizer_node);
    let any_byte_level = pre_tokenizer_is_byte_level
        || contains_byte_level(doc.get("post_processor"))
        || contains_byte_level(doc.get("decoder"));

    let model = doc
        .get("model")
        .and_then(|node| build_model(node, any_byte_level && !pre_tokenizer_is_byte_level));

    let normalizer = doc.get("normalizer").and_then(build_normalizer);
    let pre_tokenizer = pre_tokenizer_node.and_then(build_pre_tokenizer);
    let decoder = doc
        .get("decoder")
        .and_then(build_decoder)
        .unwrap_or(Decoder::ByteLevel);

    let (added, specials) = build_added_tokens(doc.get("added_tokens"));

    let post_processor = doc.get("post_processor").and_then(|node| {
        build_post_processor(node, &|name| {
            added
                .token_to_id(name)
                .or_else(|| model.as_ref().and_then(|m| m.token_to_id(name)))
        })
    });

    debug!(
        vocab_size = model.as_ref().map(Model::vocab_size).unwrap_or(0),
        added_tokens = added.iter().count(),
        "loaded tokenizer pipeline"
    );

    Ok(Tokenizer {
        normalizer,
        pre_tokenizer,
        model,
        post_processor,
        decoder,
        added,
        specials,
        chat_template: None,
    })
}

/// Apply `tokenizer_config.json` settings to a loaded tokenizer.
fn apply_config(
    tokenizer: &mut Tokenizer,
    config: &Value,
) {
    if let Some(template) = config.get("chat_template").and_then(Value::as_str) {
        tokenizer.set_chat_template(template);
    }
    if let Some(flag) = config
        .get("clean_up_tokenization_spaces")
        .and_then(Value::as_bool)
    {
        tokenizer.set_clean_up_tokenization_spaces(flag);
    }

    let resolve = |key: &str| -> Option<Option<TokenId>> {
        let node = config.get(key)?;
        let content = token_content(node)?;
        let id = tokenizer.token_to_id(content);
        Some((id != NO_TOKEN).then_some(id))
    };

    let bos = resolve("bos_token");
    let eos = resolve("eos_token");
    let pad = resolve("pad_token");
    let unk = resolve("unk_token");

    if let Some(id) = bos {
        tokenizer.specials.bos = id;
    }
    if let Some(id) = eos {
        tokenizer.specials.eos = id;
    }
    if let Some(id) = pad {
        tokenizer.specials.pad = id;
    }
    if let Some(id) = unk {
        tokenizer.specials.unk = id;
    }
}

/// A token declared either as a bare string or as `{content: ...}`.
fn token_content(node: &Value) -> Option<&str> {
    node.as_str()
        .or_else(|| node.get("content").and_then(Value::as_str))
}

fn node_type(node: &Value) -> &str {
    node.get("type").and_then(Value::as_str).unwrap_or("")
}

fn str_field<'v>(
    node: &'v Value,
    key: &str,
) -> Option<&'v str> {
    node.get(key).and_then(Value::as_str)
}

fn bool_field(
    node: &Value,
    key: &str,
    default: bool,
) -> bool {
    node.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// A `pattern` field: `{Regex: ...}`, `{String: ...}`, or a bare string
/// (treated as a regex).
enum PatternField {
    Regex(String),
    Literal(String),
}

impl PatternField {
    fn read(node: &Value) -> Option<Self> {
        match node.get("pattern")? {
            Value::String(s) => Some(Self::Regex(s.clone())),
            Value::Object(map) => {
                if let Some(s) = map.get("Regex").and_then(Value::as_str) {
                    Some(Self::Regex(s.to_string()))
                } else {
                    map.get("String")
                        .and_then(Value::as_str)
                        .map(|s| Self::Literal(s.to_string()))
                }
            }
            _ => None,
        }
    }

    /// The raw pattern text, for stages that replace literally.
    fn literal(self) -> String {
        match self {
            Self::Regex(s) => s,
            Self::Literal(s) => s,
        }
    }

    /// A compilable pattern, escaping literal variants.
    fn to_regex_pattern(&self) -> RegexPattern {
        match self {
            Self::Regex(s) => RegexPattern::Adaptive(s.clone()),
            Self::Literal(s) => RegexPattern::Basic(::regex::escape(s)),
        }
    }
}

fn contains_byte_level(node: Option<&Value>) -> bool {
    let Some(node) = node else { return false };
    if !node.is_object() {
        return false;
    }
    if node_type(node) == "ByteLevel" {
        return true;
    }
    for key in ["pretokenizers", "processors", "decoders"] {
        if let Some(children) = node.get(key).and_then(Value::as_array) {
            if children
                .iter()
                .any(|child| child.is_object() && node_type(child) == "ByteLevel")
            {
                return true;
            }
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

fn build_model(
    node: &Value,
    use_byte_level: bool,
) -> Option<Model> {
    if !node.is_object() {
        return None;
    }

    let explicit = node_type(node);
    let kind = if !explicit.is_empty() {
        explicit.to_string()
    } else {
        detect_model_kind(node).to_string()
    };

    match kind.as_str() {
        "BPE" => Some(Model::Bpe(build_bpe(node, use_byte_level))),
        "WordPiece" => Some(Model::WordPiece(build_wordpiece(node))),
        "Unigram" => Some(Model::Unigram(build_unigram(node))),
        other => {
            debug!("skipping unknown model type {other:?}");
            None
        }
    }
}

/// Model auto-detection when the `type` field is absent.
fn detect_model_kind(node: &Value) -> &'static str {
    let vocab = node.get("vocab");
    if vocab.is_some_and(Value::is_array) {
        return "Unigram";
    }
    let has_prefix = node
        .get("continuing_subword_prefix")
        .is_some_and(|v| !v.is_null());
    let has_merges = node.get("merges").is_some_and(|v| !v.is_null());
    if has_prefix || (vocab.is_some_and(Value::is_object) && !has_merges) {
        return "WordPiece";
    }
    "BPE"
}

fn build_object_vocab(node: &Value) -> Vocab {
    let mut vocab = Vocab::default();
    if let Some(map) = node.get("vocab").and_then(Value::as_object) {
        for (token, id) in map {
            if let Some(id) = id.as_i64() {
                vocab.insert(token.clone(), id as TokenId);
            }
        }
    }
    vocab
}

fn build_bpe(
    node: &Value,
    use_byte_level: bool,
) -> BpeModel {
    let vocab = build_object_vocab(node);

    let mut merges = MergeTable::default();
    let mut discarded = 0_usize;
    if let Some(items) = node.get("merges").and_then(Value::as_array) {
        let mut rank = 0_u32;
        for item in items {
            let Some((left, right)) = merge_pair(item) else {
                continue;
            };
            match (vocab.token_to_id(left), vocab.token_to_id(right)) {
                (Some(a), Some(b)) => {
                    merges.insert((a, b), rank);
                    rank += 1;
                }
                // Merges with missing operands are silently discarded.
                _ => discarded += 1,
            }
        }
    }

    debug!(
        vocab_size = vocab.len(),
        merges = merges.len(),
        discarded,
        use_byte_level,
        "loaded BPE model"
    );

    BpeModel::new(
        vocab,
        merges,
        use_byte_level,
        bool_field(node, "byte_fallback", false),
    )
}

/// A merge entry: either a space-separated string pair or a two-element
/// array.
fn merge_pair(item: &Value) -> Option<(&str, &str)> {
    match item {
        Value::String(line) => line.split_once(' '),
        Value::Array(parts) if parts.len() >= 2 => {
            Some((parts[0].as_str()?, parts[1].as_str()?))
        }
        _ => None,
    }
}

fn build_wordpiece(node: &Value) -> WordPieceModel {
    let vocab = build_object_vocab(node);
    let unk_token = str_field(node, "unk_token").unwrap_or("[UNK]");
    let prefix = str_field(node, "continuing_subword_prefix")
        .unwrap_or(crate::models::wordpiece::DEFAULT_CONTINUING_PREFIX);
    let max_input_chars = node
        .get("max_input_chars_per_word")
        .and_then(Value::as_u64)
        .unwrap_or(crate::models::wordpiece::DEFAULT_MAX_INPUT_CHARS as u64)
        as usize;

    debug!(vocab_size = vocab.len(), "loaded WordPiece model");

    WordPieceModel::new(vocab, unk_token, prefix.to_string(), max_input_chars)
}

fn build_unigram(node: &Value) -> UnigramModel {
    let mut entries = Vec::new();
    if let Some(items) = node.get("vocab").and_then(Value::as_array) {
        for item in items {
            let Some(parts) = item.as_array() else {
                continue;
            };
            let (Some(token), Some(score)) = (
                parts.first().and_then(Value::as_str),
                parts.get(1).and_then(Value::as_f64),
            ) else {
                continue;
            };
            entries.push(UnigramEntry {
                token: token.to_string(),
                score,
            });
        }
    }

    let unk_id = node
        .get("unk_id")
        .and_then(Value::as_i64)
        .and_then(|id| (id >= 0 && (id as usize) < entries.len()).then_some(id as TokenId));

    debug!(vocab_size = entries.len(), "loaded Unigram model");

    UnigramModel::new(entries, unk_id, bool_field(node, "byte_fallback", false))
}

// ---------------------------------------------------------------------------
// Pipeline stages
// ---------------------------------------------------------------------------

fn build_normalizer(node: &Value) -> Option<Normalizer> {
    if !node.is_object() {
        return None;
    }
    match node_type(node) {
        "NFKC" | "NFKD" => Some(Normalizer::Nfkc),
        "Precompiled" => Some(Normalizer::Precompiled),
        "Lowercase" => Some(Normalizer::Lowercase),
        "StripAccents" => Some(Normalizer::StripAccents),
        "Prepend" => Some(Normalizer::Prepend {
            prepend: str_field(node, "prepend").unwrap_or_default().to_string(),
        }),
        "Replace" => Some(Normalizer::Replace {
            pattern: PatternField::read(node)
                .map(PatternField::literal)
                .unwrap_or_default(),
            content: str_field(node, "content").unwrap_or_default().to_string(),
        }),
        "BertNormalizer" => Some(Normalizer::Bert {
            clean_text: bool_field(node, "clean_text", true),
            handle_chinese_chars: bool_field(node, "handle_chinese_chars", true),
            strip_accents: node.get("strip_accents").and_then(Value::as_bool),
            lowercase: bool_field(node, "lowercase", true),
        }),
        "Sequence" => {
            let children = node.get("normalizers").and_then(Value::as_array)?;
            Some(Normalizer::Sequence(
                children.iter().filter_map(build_normalizer).collect(),
            ))
        }
        other => {
            debug!("skipping unknown normalizer type {other:?}");
            None
        }
    }
}

fn build_pre_tokenizer(node: &Value) -> Option<PreTokenizer> {
    if !node.is_object() {
        return None;
    }
    match node_type(node) {
        "Split" => {
            let pattern = PatternField::read(node)?;
            Some(PreTokenizer::Split {
                // A failed compile leaves the stage as a pass-through.
                regex: pattern.to_regex_pattern().compile().ok(),
                invert: bool_field(node, "invert", false),
                behavior: split_behavior(str_field(node, "behavior").unwrap_or("Isolated")),
            })
        }
        "WhitespaceSplit" => Some(PreTokenizer::Split {
            regex: RegexPattern::Basic(r"\s+".to_string()).compile().ok(),
            invert: false,
            behavior: SplitBehavior::Removed,
        }),
        "ByteLevel" => Some(PreTokenizer::byte_level(bool_field(node, "use_regex", true))),
        "Digits" => Some(PreTokenizer::Digits {
            individual_digits: bool_field(node, "individual_digits", false),
        }),
        "Metaspace" => Some(PreTokenizer::Metaspace {
            replacement: str_field(node, "replacement")
                .unwrap_or("\u{2581}")
                .to_string(),
            add_prefix_space: bool_field(node, "add_prefix_space", true),
        }),
        "BertPreTokenizer" => Some(PreTokenizer::Bert),
        "Sequence" => {
            let children = node.get("pretokenizers").and_then(Value::as_array)?;
            Some(PreTokenizer::Sequence(
                children.iter().filter_map(build_pre_tokenizer).collect(),
            ))
        }
        other => {
            debug!("skipping unknown pre-tokenizer type {other:?}");
            None
        }
    }
}

fn split_behavior(name: &str) -> SplitBehavior {
    match name {
        "Removed" => SplitBehavior::Removed,
        _ => SplitBehavior::Isolated,
    }
}

fn build_decoder(node: &Value) -> Option<Decoder> {
    if !node.is_object() {
        return None;
    }
    match node_type(node) {
        "Replace" => Some(Decoder::Replace {
            pattern: PatternField::read(node)
                .map(PatternField::literal)
                .unwrap_or_default(),
            content: str_field(node, "content").unwrap_or_default().to_string(),
        }),
        "ByteFallback" => Some(Decoder::ByteFallback),
        "ByteLevel" => Some(Decoder::ByteLevel),
        "Fuse" => Some(Decoder::Fuse),
        "Strip" => Some(Decoder::Strip {
            content: str_field(node, "content").unwrap_or_default().to_string(),
            start: node.get("start").and_then(Value::as_u64).unwrap_or(0) as usize,
            stop: node.get("stop").and_then(Value::as_u64).unwrap_or(0) as usize,
        }),
        "WordPiece" => Some(Decoder::WordPiece {
            prefix: str_field(node, "prefix").unwrap_or("##").to_string(),
            cleanup: bool_field(node, "cleanup", true),
        }),
        "Metaspace" => Some(Decoder::Metaspace {
            replacement: str_field(node, "replacement")
                .unwrap_or("\u{2581}")
                .to_string(),
            add_prefix_space: bool_field(node, "add_prefix_space", true),
        }),
        "Sequence" => {
            let children = node.get("decoders").and_then(Value::as_array)?;
            Some(Decoder::Sequence(
                children.iter().filter_map(build_decoder).collect(),
            ))
        }
        other => {
            debug!("skipping unknown decoder type {other:?}");
            None
        }
    }
}

fn build_post_processor(
    node: &Value,
    lookup: &dyn Fn(&str) -> Option<TokenId>,
) -> Option<TemplateProcessing> {
    if !node.is_object() {
        return None;
    }
    match node_type(node) {
        "TemplateProcessing" => {
            let single = node.get("single").and_then(Value::as_array)?;
            let mut steps = Vec::with_capacity(single.len());
            for item in single {
                if let Some(name) = item
                    .get("SpecialToken")
                    .and_then(|t| t.get("id"))
                    .and_then(Value::as_str)
                {
                    steps.push(TemplateStep::Special(lookup(name)));
                } else if item.get("Sequence").is_some() {
                    steps.push(TemplateStep::Sequence);
                }
            }
            Some(TemplateProcessing::new(steps))
        }
        "Sequence" => {
            let children = node.get("processors").and_then(Value::as_array)?;
            children
                .iter()
                .filter(|child| node_type(child) == "TemplateProcessing")
                .find_map(|child| build_post_processor(child, lookup))
        }
        other => {
            debug!("skipping unknown post-processor type {other:?}");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Added tokens
// ---------------------------------------------------------------------------

fn build_added_tokens(node: Option<&Value>) -> (AddedVocab, SpecialTokens) {
    let mut tokens = Vec::new();
    let mut specials = SpecialTokens::default();

    if let Some(items) = node.and_then(Value::as_array) {
        for item in items {
            let Some(content) = str_field(item, "content").filter(|c| !c.is_empty()) else {
                continue;
            };
            let Some(id) = item.get("id").and_then(Value::as_i64).filter(|&id| id >= 0)
            else {
                continue;
            };
            let id = id as TokenId;

            match content {
                "[PAD]" | "<pad>" => specials.pad = Some(id),
                "[BOS]" | "<s>" | "<bos>" => specials.bos = Some(id),
                "[EOS]" | "</s>" | "<eos>" => specials.eos = Some(id),
                "[UNK]" | "<unk>" => specials.unk = Some(id),
                _ => {}
            }

            tokens.push(AddedToken {
                id,
                content: content.to_string(),
                special: bool_field(item, "special", false),
                lstrip: bool_field(item, "lstrip", false),
                rstrip: bool_field(item, "rstrip", false),
                normalized: bool_field(item, "normalized", false),
            });
        }
    }

    (AddedVocab::new(tokens), specials)
}
