//! The text-generation seam the harness measures

use anyhow::Result;

/// A long-lived text generator.
///
/// Implementations own their model, tokenizer and device; the harness only
/// sees prompt in, text out.
pub trait TextGenerator {
    /// Generate a completion for `prompt`. The returned text includes the
    /// prompt itself.
    fn generate(&mut self, prompt: &str) -> Result<String>;

    /// Number of parameter tensors in the model
    fn parameter_count(&self) -> usize;

    /// Hidden dimension of the model
    fn hidden_size(&self) -> usize;
}

impl<G: TextGenerator + ?Sized> TextGenerator for Box<G> {
    fn generate(&mut self, prompt: &str) -> Result<String> {
        (**self).generate(prompt)
    }

    fn parameter_count(&self) -> usize {
        (**self).parameter_count()
    }

    fn hidden_size(&self) -> usize {
        (**self).hidden_size()
    }
}
