//! # Chat Template Handle
//!
//! Wraps the external templating engine behind the invocation contract the
//! façade needs: messages, the bos/eos token strings, and the
//! generation-prompt flag in; formatted text out.

use minijinja::{context, Environment};

use crate::errors::{LoomError, LoomResult};

/// A compiled chat template.
pub struct ChatTemplate {
    env: Environment<'static>,
}

impl core::fmt::Debug for ChatTemplate {
    fn fmt(
        &self,
        f: &mut core::fmt::Formatter<'_>,
    ) -> core::fmt::Result {
        f.debug_struct("ChatTemplate").finish()
    }
}

impl ChatTemplate {
    /// Compile a template from its source.
    ///
    /// ## Arguments
    /// * `source` - The Jinja template string.
    ///
    /// ## Returns
    /// A `Result` containing the compiled handle.
    pub fn new(source: &str) -> LoomResult<Self> {
        let mut env = Environment::new();
        env.add_template_owned("chat".to_string(), source.to_string())
            .map_err(|e| LoomError::Template(e.to_string()))?;
        Ok(Self { env })
    }

    /// Render the template for a message list.
    ///
    /// ## Arguments
    /// * `messages` - A JSON array of `{role, content}` objects.
    /// * `bos_token` - The bos token string ("" when absent).
    /// * `eos_token` - The eos token string ("" when absent).
    /// * `add_generation_prompt` - Append the assistant prompt frame.
    ///
    /// ## Returns
    /// The formatted text.
    pub fn render(
        &self,
        messages: &serde_json::Value,
        bos_token: &str,
        eos_token: &str,
        add_generation_prompt: bool,
    ) -> LoomResult<String> {
        let template = self
            .env
            .get_template("chat")
            .map_err(|e| LoomError::Template(e.to_string()))?;
        template
            .render(context! {
                messages => messages,
                bos_token => bos_token,
                eos_token => eos_token,
                add_generation_prompt => add_generation_prompt,
            })
            .map_err(|e| LoomError::Template(e.to_string()))
    }
}
