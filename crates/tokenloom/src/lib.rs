//! # `tokenloom` Tokenization Pipeline
//!
//! A byte-exact reimplementation of the HF `tokenizers` pipeline, so that
//! an inference runtime can turn strings into id sequences (and back)
//! without the Python training stack.
//!
//! A tokenizer is loaded declaratively from a `tokenizer.json` document
//! (plus an optional `tokenizer_config.json`) and composes:
//!
//! * [`normalizers`] - string-to-string rewriting (NFKC, Bert, ...).
//! * [`pretokenizers`] - fragment splitting (regex, byte-level, metaspace, ...).
//! * [`models`] - BPE, WordPiece, and Unigram id assignment.
//! * [`processors`] - template-driven special-token framing.
//! * [`decoders`] - the inverse pipeline back to text.
//!
//! ## Loading a Tokenizer
//!
//! ```rust,ignore
//! let tokenizer = tokenloom::from_pretrained("path/to/model")?;
//!
//! let ids = tokenizer.encode("Hello, world!", true);
//! let text = tokenizer.decode(&ids, true);
//! ```
#![warn(missing_docs, unused)]

pub mod added;
pub mod alphabet;
pub mod chat;
pub mod decoders;
pub mod errors;
pub mod loader;
pub mod models;
pub mod normalizers;
pub mod pretokenizers;
pub mod processors;
pub mod regex;
pub mod tokenizer;
pub mod types;
pub mod unicode;

pub use errors::{LoomError, LoomResult};
pub use loader::{from_json_str, from_pretrained};
pub use tokenizer::{SpecialTokens, Tokenizer};
pub use types::{TokenId, NO_TOKEN};
