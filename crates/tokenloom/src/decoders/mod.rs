//! # Decoders
//!
//! Stages that transform a sequence of token byte-strings; the final
//! output is their concatenation. Tokens are bytes rather than `str`
//! because ByteFallback can produce lone bytes mid-sequence that only
//! become valid UTF-8 after fusing.

use crate::alphabet::ByteAlphabet;

/// A decoding stage.
#[derive(Debug, Clone)]
pub enum Decoder {
    /// Literal substring replacement inside each token.
    Replace {
        /// The literal pattern to search for.
        pattern: String,
        /// The replacement content.
        content: String,
    },

    /// Replace `<0xHH>` tokens with the raw byte they name.
    ByteFallback,

    /// Reverse-map each code point through the byte alphabet; code points
    /// outside the alphabet pass through unchanged.
    ByteLevel,

    /// Concatenate all tokens into one, fencing off later per-token stages.
    Fuse,

    /// Strip one occurrence of a literal from the sequence edges.
    Strip {
        /// The literal to strip.
        content: String,
        /// Strip a leading occurrence from the first token.
        start: usize,
        /// Strip a trailing occurrence from the last token.
        stop: usize,
    },

    /// WordPiece de-tokenization: join with spaces, dropping the
    /// continuation prefix.
    WordPiece {
        /// The continuation prefix, typically "##".
        prefix: String,
        /// Suppress spaces around common punctuation.
        cleanup: bool,
    },

    /// Restore spaces from the metaspace marker.
    Metaspace {
        /// The marker string, typically "\u{2581}".
        replacement: String,
        /// Strip one leading space from the first token.
        add_prefix_space: bool,
    },

    /// Apply the contained decoders in order.
    Sequence(Vec<Decoder>),
}

impl Decoder {
    /// Apply this stage to a token sequence in place.
    pub fn decode(
        &self,
        tokens: &mut Vec<Vec<u8>>,
    ) {
        match self {
            Self::Replace { pattern, content } => {
                for token in tokens.iter_mut() {
                    *token = replace_bytes(token, pattern.as_bytes(), content.as_bytes());
                }
            }
            Self::ByteFallback => {
                for token in tokens.iter_mut() {
                    if let Some(byte) = parse_byte_token(token) {
                        *token = vec![byte];
                    }
                }
            }
            Self::ByteLevel => {
                let alphabet = ByteAlphabet::get();
                for token in tokens.iter_mut() {
                    *token = byte_level_decode(alphabet, token);
                }
            }
            Self::Fuse => {
                if tokens.len() > 1 {
                    let fused = tokens.concat();
                    *tokens = vec![fused];
                }
            }
            Self::Strip {
                content,
                start,
                stop,
            } => {
                let needle = content.as_bytes();
                if needle.is_empty() {
                    return;
                }
                if *start > 0 {
                    if let Some(first) = tokens.first_mut() {
                        if first.starts_with(needle) {
                            first.drain(..needle.len());
                        }
                    }
                }
                if *stop > 0 {
                    if let Some(last) = tokens.last_mut() {
                        if last.ends_with(needle) {
                            last.truncate(last.len() - needle.len());
                        }
                    }
                }
            }
            Self::WordPiece { prefix, cleanup } => {
                wordpiece_decode(tokens, prefix.as_bytes(), *cleanup);
            }
            Self::Metaspace {
                replacement,
                add_prefix_space,
            } => {
                for token in tokens.iter_mut() {
                    *token = replace_bytes(token, replacement.as_bytes(), b" ");
                }
                if *add_prefix_space {
                    if let Some(first) = tokens.first_mut() {
                        if first.first() == Some(&b' ') {
                            first.remove(0);
                        }
                    }
                }
            }
            Self::Sequence(decoders) => {
                for decoder in decoders {
                    decoder.decode(tokens);
                }
            }
        }
    }

    /// Propagate the clean-up-spaces flag into every WordPiece decoder.
    ///
    /// This is the one mutable-after-load pipeline setting.
    pub fn set_wordpiece_cleanup(
        &mut self,
        flag: bool,
    ) {
        match self {
            Self::WordPiece { cleanup, .. } => *cleanup = flag,
            Self::Sequence(decoders) => {
                for decoder in decoders {
                    decoder.set_wordpiece_cleanup(flag);
                }
            }
            _ => {}
        }
    }
}

/// Replace every occurrence of `needle`, left to right, advancing past
/// each replacement.
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

/// Parse a `<0xHH>` byte-fallback token.
fn parse_byte_token(token: &[u8]) -> Option<u8> {
    if token.len() != 6 || !token.starts_with(b"<0x") || token[5] != b'>' {
        return None;
    }
    let hex = core::str::from_utf8(&token[3..5]).ok()?;
    u8::from_str_radix(hex, 16).ok()
}

fn byte_level_decode(
    alphabet: &ByteAlphabet,
    token: &[u8],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(token.len());
    let mut i = 0;
    while i < token.len() {
        match core::str::from_utf8(&token[i..]) {
            Ok(chunk) => {
                push_decoded_chars(alphabet, chunk, &mut out);
                break;
            }
            Err(e) if e.valid_up_to() > 0 => {
                let valid = e.valid_up_to();
                let chunk = core::str::from_utf8(&token[i..i + valid]).unwrap_or_default();
                push_decoded_chars(alphabet, chunk, &mut out);
                i += valid;
            }
            Err(_) => {
                // Not alphabet output; pass the raw byte through.
                out.push(token[i]);
                i += 1;
            }
        }
    }
    out
}

fn push_decoded_chars(
    alphabet: &ByteAlphabet,
    chunk: &str,
    out: &mut Vec<u8>,
) {
    let mut buf = [0_u8; 4];
    for c in chunk.chars() {
        match alphabet.byte_for(c) {
            Some(byte) => out.push(byte),
            None => out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes()),
        }
    }
}

fn wordpiece_decode(
    tokens: &mut Vec<Vec<u8>>,
    prefix: &[u8],
    cleanup: bool,
) {
    for (i, token) in tokens.iter_mut().enumerate() {
        if i > 0 {
            if !prefix.is_empty() && token.starts_with(prefix) {
                token.drain(..prefix.len());
            } else {
                token.insert(0, b' ');
            }
        }
        if cleanup {
            let mut cleaned = token.clone();
            for punct in [" .", " ,", " !", " ?", " '"] {
                cleaned = replace_bytes(&cleaned, punct.as_bytes(), &punct.as_bytes()[1..]);
            }
            cleaned = replace_bytes(&cleaned, b"' ", b"'");
            *token = cleaned;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(parts: &[&str]) -> Vec<Vec<u8>> {
        parts.iter().map(|p| p.as_bytes().to_vec()).collect()
    }

    fn concat(tokens: &[Vec<u8>]) -> String {
        String::from_utf8_lossy(&tokens.concat()).into_owned()
    }

    #[test]
    fn test_replace() {
        let decoder = Decoder::Replace {
            pattern: "\u{2581}".to_string(),
            content: " ".to_string(),
        };
        let mut toks = tokens(&["\u{2581}Hello", "\u{2581}world"]);
        decoder.decode(&mut toks);
        assert_eq!(concat(&toks), " Hello world");
    }

    #[test]
    fn test_byte_fallback() {
        let decoder = Decoder::ByteFallback;
        let mut toks = tokens(&["a", "<0xC3>", "<0xA9>", "<0xZZ>", "<0x41>x"]);
        decoder.decode(&mut toks);
        // The two hex tokens fuse into "é"; malformed ones pass through.
        assert_eq!(concat(&toks), "a\u{E9}<0xZZ><0x41>x");
    }

    #[test]
    fn test_byte_level() {
        let decoder = Decoder::ByteLevel;
        let mut toks = tokens(&["Hello", "\u{120}world"]);
        decoder.decode(&mut toks);
        assert_eq!(concat(&toks), "Hello world");

        // Code points outside the alphabet pass through unchanged.
        let mut toks = tokens(&["\u{4E16}ok"]);
        decoder.decode(&mut toks);
        assert_eq!(concat(&toks), "\u{4E16}ok");
    }

    #[test]
    fn test_fuse_and_strip() {
        let decoder = Decoder::Sequence(vec![
            Decoder::Fuse,
            Decoder::Strip {
                content: " ".to_string(),
                start: 1,
                stop: 0,
            },
        ]);
        let mut toks = tokens(&[" Hello", " world"]);
        decoder.decode(&mut toks);
        assert_eq!(toks.len(), 1);
        assert_eq!(concat(&toks), "Hello world");
    }

    #[test]
    fn test_strip_stop() {
        let decoder = Decoder::Strip {
            content: "</s>".to_string(),
            start: 0,
            stop: 1,
        };
        let mut toks = tokens(&["Hello", "world</s>"]);
        decoder.decode(&mut toks);
        assert_eq!(concat(&toks), "Helloworld");
    }

    #[test]
    fn test_wordpiece() {
        let decoder = Decoder::WordPiece {
            prefix: "##".to_string(),
            cleanup: false,
        };
        let mut toks = tokens(&["un", "##aff", "##able", "fox"]);
        decoder.decode(&mut toks);
        assert_eq!(concat(&toks), "unaffable fox");
    }

    #[test]
    fn test_wordpiece_cleanup() {
        let decoder = Decoder::WordPiece {
            prefix: "##".to_string(),
            cleanup: true,
        };
        let mut toks = tokens(&["hello", "world", "!"]);
        decoder.decode(&mut toks);
        assert_eq!(concat(&toks), "hello world!");
    }

    #[test]
    fn test_metaspace() {
        let decoder = Decoder::Metaspace {
            replacement: "\u{2581}".to_string(),
            add_prefix_space: true,
        };
        let mut toks = tokens(&["\u{2581}Hello", "\u{2581}world"]);
        decoder.decode(&mut toks);
        assert_eq!(concat(&toks), "Hello world");
    }

    #[test]
    fn test_cleanup_propagation() {
        let mut decoder = Decoder::Sequence(vec![
            Decoder::ByteFallback,
            Decoder::Sequence(vec![Decoder::WordPiece {
                prefix: "##".to_string(),
                cleanup: false,
            }]),
        ]);
        decoder.set_wordpiece_cleanup(true);

        let Decoder::Sequence(ref outer) = decoder else {
            unreachable!()
        };
        let Decoder::Sequence(ref inner) = outer[1] else {
            unreachable!()
        };
        assert!(matches!(
            inner[0],
            Decoder::WordPiece { cleanup: true, .. }
        ));
    }
}
