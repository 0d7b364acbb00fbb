//! # Post-Processing
//!
//! Template-driven special-token framing of a completed id sequence.

use crate::types::TokenId;

/// A completed encoding: ids plus a trivial all-ones attention mask.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Encoding {
    /// The token ids.
    pub input_ids: Vec<TokenId>,

    /// The attention mask; always all ones, same length as `input_ids`.
    pub attention_mask: Vec<TokenId>,
}

impl Encoding {
    /// Build an encoding from ids, with the all-ones mask.
    pub fn from_ids(input_ids: Vec<TokenId>) -> Self {
        let attention_mask = vec![1; input_ids.len()];
        Self {
            input_ids,
            attention_mask,
        }
    }
}

/// One step of a processing template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateStep {
    /// Emit a literal special-token id. Ids that did not resolve at load
    /// time are dropped at application.
    Special(Option<TokenId>),

    /// Splice in the model-produced id sequence.
    Sequence,
}

/// A declarative special-token framing template.
#[derive(Debug, Clone, Default)]
pub struct TemplateProcessing {
    steps: Vec<TemplateStep>,
}

impl TemplateProcessing {
    /// Build a template from its steps.
    pub fn new(steps: Vec<TemplateStep>) -> Self {
        Self { steps }
    }

    /// Apply the template to an encoding in place.
    pub fn process(
        &self,
        encoding: &mut Encoding,
    ) {
        let mut out = Vec::with_capacity(encoding.input_ids.len() + self.steps.len());
        for step in &self.steps {
            match step {
                TemplateStep::Special(Some(id)) => out.push(*id),
                TemplateStep::Special(None) => {}
                TemplateStep::Sequence => out.extend_from_slice(&encoding.input_ids),
            }
        }
        encoding.attention_mask = vec![1; out.len()];
        encoding.input_ids = out;
    }
}
