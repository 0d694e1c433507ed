use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::text::NormalizedText;

mod dense;
mod lazy;
mod sentence;

pub use dense::DenseEmbeddings;
pub use lazy::LazyEmbeddings;
pub use sentence::{DEFAULT_SENTENCE_DIM, MIN_SENTENCE_DIM, SentenceEmbeddings};

pub trait EmbeddingProvider: Send + Sync {
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    fn vector(&self, token: &str) -> Result<Vec<f32>>;

    fn embed_tokens(&self, tokens: &[String]) -> Result<Vec<f32>> {
        let dimension = self.dimension();
        let mut sum = vec![0_f32; dimension];
        if tokens.is_empty() {
            return Ok(sum);
        }

        for token in tokens {
            let vector = self.vector(token)?;
            if vector.len() != dimension {
                bail!(
                    "vector for token '{token}' has {} dimensions, expected {dimension}",
                    vector.len()
                );
            }
            for (slot, value) in sum.iter_mut().zip(vector.iter()) {
                *slot += value;
            }
        }

        let count = tokens.len() as f32;
        for slot in &mut sum {
            *slot /= count;
        }
        Ok(sum)
    }

    fn embed_text(&self, text: &NormalizedText) -> Result<Vec<f32>> {
        self.embed_tokens(&text.tokens)
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingBackend {
    Dense,
    Lazy,
    #[default]
    Sentence,
}

impl EmbeddingBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dense => "dense",
            Self::Lazy => "lazy",
            Self::Sentence => "sentence",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSource {
    pub backend: EmbeddingBackend,
    pub vectors_path: Option<PathBuf>,
    pub vocab_path: Option<PathBuf>,
    pub dimension: Option<usize>,
}

pub fn load_embeddings(source: &EmbeddingSource) -> Result<Box<dyn EmbeddingProvider>> {
    match source.backend {
        EmbeddingBackend::Sentence => Ok(Box::new(SentenceEmbeddings::new(
            source.dimension.unwrap_or(DEFAULT_SENTENCE_DIM),
        )?)),
        EmbeddingBackend::Dense => {
            let Some(vectors_path) = source.vectors_path.as_deref() else {
                bail!("dense embeddings require a vectors file");
            };
            let Some(vocab_path) = source.vocab_path.as_deref() else {
                bail!("dense embeddings require a vocabulary file");
            };
            Ok(Box::new(DenseEmbeddings::load(vectors_path, vocab_path)?))
        }
        EmbeddingBackend::Lazy => {
            let Some(vectors_path) = source.vectors_path.as_deref() else {
                bail!("lazy embeddings require a vectors file");
            };
            let provider = match source.vocab_path.as_deref() {
                Some(vocab_path) => LazyEmbeddings::load_with_vocabulary(vectors_path, vocab_path)?,
                None => LazyEmbeddings::load_glove(vectors_path)?,
            };
            Ok(Box::new(provider))
        }
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read embedding file: {}", path.display()))?;
    Ok(raw
        .lines()
        .map(|line| line.trim_end().to_string())
        .collect::<Vec<String>>())
}

fn model_id_for(backend: EmbeddingBackend, path: &Path) -> String {
    let name = path
        .file_name()
        .map(|value| value.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}:{name}", backend.as_str())
}
