use anyhow::{Result, bail};
use sha2::{Digest, Sha256};

use super::EmbeddingProvider;
use crate::text::NormalizedText;

pub const DEFAULT_SENTENCE_DIM: usize = 384;
pub const MIN_SENTENCE_DIM: usize = 8;
const SENTENCE_MODEL_ID: &str = "sentence:local-hash-v1";

// Local hashed sentence model: word and bigram features folded into a fixed
// number of signed buckets, L2-normalised. The whole text is one unit.
#[derive(Debug, Clone)]
pub struct SentenceEmbeddings {
    model_id: String,
    dimension: usize,
}

impl SentenceEmbeddings {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension < MIN_SENTENCE_DIM {
            bail!(
                "sentence embeddings need at least {MIN_SENTENCE_DIM} dimensions, got {dimension}"
            );
        }
        Ok(Self {
            model_id: format!("{SENTENCE_MODEL_ID}/{dimension}"),
            dimension,
        })
    }

    pub fn embed_sentence(&self, sentence: &str) -> Vec<f32> {
        let mut vector = vec![0_f32; self.dimension];
        let words = sentence.split_whitespace().collect::<Vec<&str>>();
        if words.is_empty() {
            return vector;
        }

        let mut features = Vec::<String>::with_capacity(words.len() * 2);
        for (index, word) in words.iter().enumerate() {
            features.push(format!("w:{word}"));
            if let Some(next) = words.get(index + 1) {
                features.push(format!("b:{word}_{next}"));
            }
        }

        for feature in &features {
            let hash = stable_hash(feature);
            let index = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            let weight = 1.0 + (((hash >> 48) & 0xFF) as f32 / 255.0);
            vector[index] += sign * weight;
        }

        normalize_vector(&mut vector);
        vector
    }
}

impl EmbeddingProvider for SentenceEmbeddings {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn vector(&self, token: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sentence(token))
    }

    fn embed_text(&self, text: &NormalizedText) -> Result<Vec<f32>> {
        Ok(self.embed_sentence(&text.text))
    }
}

fn stable_hash(value: &str) -> u64 {
    let digest = Sha256::digest(value.as_bytes());
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

fn normalize_vector(values: &mut [f32]) {
    let squared_norm = values
        .iter()
        .map(|value| f64::from(*value) * f64::from(*value))
        .sum::<f64>();

    if squared_norm <= 0.0 {
        return;
    }

    let norm = squared_norm.sqrt() as f32;
    for value in values {
        *value /= norm;
    }
}
