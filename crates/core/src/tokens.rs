use std::path::Path;
use tokenizers::Tokenizer;
use tracing::warn;

/// Token counter used as the chunk-size metric.
///
/// Counts with a HuggingFace `tokenizer.json` vocabulary when one is
/// configured, otherwise with a chars/4 approximation. Counts are
/// approximate across tokenizer families; chunk budgets sized with one
/// vocabulary will not land on identical boundaries with another.
#[derive(Clone)]
pub struct TokenCounter {
    vocab: Option<Tokenizer>,
}

impl TokenCounter {
    pub fn from_vocab_file(path: &Path) -> anyhow::Result<Self> {
        let vocab = Tokenizer::from_file(path).map_err(|error| {
            anyhow::anyhow!(
                "failed to load tokenizer vocabulary {}: {error}",
                path.display()
            )
        })?;
        Ok(Self { vocab: Some(vocab) })
    }

    pub fn approximate() -> Self {
        Self { vocab: None }
    }

    /// Loads the vocabulary at `path` when given, warning and degrading to
    /// the approximation instead of failing.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::approximate();
        };

        match Self::from_vocab_file(path) {
            Ok(counter) => counter,
            Err(error) => {
                warn!(%error, "falling back to approximate token counts");
                Self::approximate()
            }
        }
    }

    pub fn count(&self, text: &str) -> usize {
        if let Some(vocab) = &self.vocab {
            if let Ok(encoding) = vocab.encode(text, false) {
                return encoding.get_ids().len();
            }
        }

        approximate_tokens(text)
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::approximate()
    }
}

fn approximate_tokens(text: &str) -> usize {
    (text.len() + 3) / 4
}
