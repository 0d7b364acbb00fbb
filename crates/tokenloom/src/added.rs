//! # Added-Token Dispatch
//!
//! Added tokens are spliced into the id sequence wherever their content
//! appears literally in the input, bypassing normalization and
//! pre-tokenization. The dispatcher splits raw input before any other
//! stage runs, so added-token content is never normalized.

use crate::regex::{exact_match_union, RegexWrapper};
use crate::types::{LoomHashMap, LoomHashSet, TokenId};

/// A declared added token.
#[derive(Debug, Clone)]
pub struct AddedToken {
    /// The token id.
    pub id: TokenId,

    /// The literal content matched in the input.
    pub content: String,

    /// Structural (bos/eos/pad/unk/...) token; skipped by decode on
    /// request.
    pub special: bool,

    /// Absorb whitespace immediately before a match.
    pub lstrip: bool,

    /// Absorb whitespace immediately after a match.
    pub rstrip: bool,

    /// Whether the content was declared subject to normalization.
    pub normalized: bool,
}

/// One unit produced by dispatcher splitting.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment<'t> {
    /// Ordinary text, to be normalized and pre-tokenized.
    Text(&'t str),

    /// An added-token match, an opaque unit.
    Added(&'t str),
}

/// The added-token table plus its maximal-munch matcher.
#[derive(Debug, Clone, Default)]
pub struct AddedVocab {
    tokens: Vec<AddedToken>,
    ids_by_content: LoomHashMap<String, TokenId>,
    contents_by_id: LoomHashMap<TokenId, String>,
    special_ids: LoomHashSet<TokenId>,
    matcher: Option<RegexWrapper>,
}

impl AddedVocab {
    /// Build the table and its longest-first alternation matcher.
    pub fn new(tokens: Vec<AddedToken>) -> Self {
        let ids_by_content = tokens
            .iter()
            .map(|t| (t.content.clone(), t.id))
            .collect::<LoomHashMap<String, TokenId>>();
        let contents_by_id = tokens
            .iter()
            .map(|t| (t.id, t.content.clone()))
            .collect::<LoomHashMap<TokenId, String>>();
        let special_ids = tokens
            .iter()
            .filter(|t| t.special)
            .map(|t| t.id)
            .collect::<LoomHashSet<TokenId>>();

        let matcher = if tokens.is_empty() {
            None
        } else {
            let contents = tokens.iter().map(|t| t.content.as_str()).collect::<Vec<_>>();
            exact_match_union(&contents).compile().ok()
        };

        Self {
            tokens,
            ids_by_content,
            contents_by_id,
            special_ids,
            matcher,
        }
    }

    /// Is the table empty?
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Iterate over the declared tokens, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &AddedToken> {
        self.tokens.iter()
    }

    /// Look up the id for an added-token content.
    pub fn token_to_id(
        &self,
        content: &str,
    ) -> Option<TokenId> {
        self.ids_by_content.get(content).copied()
    }

    /// Look up the content for an added-token id.
    pub fn id_to_token(
        &self,
        id: TokenId,
    ) -> Option<&str> {
        self.contents_by_id.get(&id).map(String::as_str)
    }

    /// Is this id declared added-and-special?
    pub fn is_special(
        &self,
        id: TokenId,
    ) -> bool {
        self.special_ids.contains(&id)
    }

    fn find(
        &self,
        content: &str,
    ) -> Option<&AddedToken> {
        self.tokens.iter().find(|t| t.content == content)
    }

    /// Split raw input into text and added-token units.
    ///
    /// Matches are maximal-munch over the declared contents. `lstrip`
    /// absorbs trailing ASCII whitespace from the preceding text; `rstrip`
    /// absorbs leading ASCII whitespace from the following text.
    pub fn split<'t>(
        &self,
        text: &'t str,
    ) -> Vec<Segment<'t>> {
        let Some(matcher) = &self.matcher else {
            return vec![Segment::Text(text)];
        };

        let mut units = Vec::new();
        let mut last = 0;
        while last < text.len() {
            let Some((start, end)) = matcher.search(text, last) else {
                units.push(Segment::Text(&text[last..]));
                break;
            };

            let matched = &text[start..end];
            let token = self.find(matched);

            let mut prefix_end = start;
            let mut next_start = end;
            if let Some(token) = token {
                if token.lstrip {
                    while prefix_end > last
                        && text.as_bytes()[prefix_end - 1].is_ascii_whitespace()
                    {
                        prefix_end -= 1;
                    }
                }
                if token.rstrip {
                    while next_start < text.len()
                        && text.as_bytes()[next_start].is_ascii_whitespace()
                    {
                        next_start += 1;
                    }
                }
            }

            if prefix_end > last {
                units.push(Segment::Text(&text[last..prefix_end]));
            }
            units.push(Segment::Added(matched));
            last = next_start;
        }
        units
    }
}
