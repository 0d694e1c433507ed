use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cache::{FailOpenCache, MemoryVectorCache, VectorCache, vector_cache_key};
use crate::config::{Aggregation, EntityBlend, FeatureWeights, ReconcileConfig};
use crate::embedding::EmbeddingProvider;
use crate::model::{ClaimRecord, FeatureScores};
use crate::similarity::{
    cosine_similarity, optional_jaccard, weighted_arithmetic_mean, weighted_geometric_mean,
};
use crate::text::{NormalizedText, TextNormalizer};

pub struct PairScorer<'a> {
    weights: FeatureWeights,
    blend: EntityBlend,
    aggregation: Aggregation,
    normalizer: TextNormalizer,
    embeddings: &'a dyn EmbeddingProvider,
    cache_namespace: String,
    memo: MemoryVectorCache,
    external: FailOpenCache<'a>,
}

impl<'a> PairScorer<'a> {
    pub fn new(
        config: &ReconcileConfig,
        embeddings: &'a dyn EmbeddingProvider,
        cache: &'a dyn VectorCache,
    ) -> Result<Self> {
        let top_k = config
            .top_k_unigrams
            .map(|value| value.to_string())
            .unwrap_or_else(|| "all".to_string());

        Ok(Self {
            weights: config.weights,
            blend: config.entity_blend,
            aggregation: config.aggregation,
            normalizer: TextNormalizer::new(config.top_k_unigrams)?,
            embeddings,
            cache_namespace: format!("{}#top-{top_k}", embeddings.model_id()),
            memo: MemoryVectorCache::new(),
            external: FailOpenCache::new(cache),
        })
    }

    pub fn cache_disabled(&self) -> bool {
        self.external.is_disabled()
    }

    pub fn feature_scores(&self, left: &ClaimRecord, right: &ClaimRecord) -> Result<FeatureScores> {
        Ok(FeatureScores {
            entity: self.entity_similarity(left, right),
            keyword: optional_jaccard(&left.keywords, &right.keywords),
            link: optional_jaccard(&left.links, &right.links),
            text: self.text_similarity(left, right)?,
        })
    }

    pub fn score(&self, left: &ClaimRecord, right: &ClaimRecord) -> Result<f64> {
        let features = self.feature_scores(left, right)?;
        Ok(self.aggregate(&features))
    }

    pub fn aggregate(&self, features: &FeatureScores) -> f64 {
        let terms = [
            (features.entity, self.weights.entity),
            (features.keyword, self.weights.keyword),
            (features.link, self.weights.link),
            (features.text, self.weights.text),
        ];
        match self.aggregation {
            Aggregation::Geometric => weighted_geometric_mean(&terms),
            Aggregation::Arithmetic => weighted_arithmetic_mean(&terms),
        }
    }

    pub fn entity_similarity(&self, left: &ClaimRecord, right: &ClaimRecord) -> Option<f64> {
        let entity = optional_jaccard(&left.entities, &right.entities);
        let category = optional_jaccard(&left.entity_categories, &right.entity_categories);

        match (entity, category) {
            (Some(entity), Some(category)) => Some(
                self.blend.entity_weight * entity + self.blend.category_weight * category,
            ),
            (Some(entity), None) => Some(entity),
            (None, Some(category)) => Some(self.blend.category_fallback * category),
            (None, None) => None,
        }
    }

    pub fn text_similarity(&self, left: &ClaimRecord, right: &ClaimRecord) -> Result<Option<f64>> {
        let left_text = self.normalizer.normalize(&left.text_fragments);
        let right_text = self.normalizer.normalize(&right.text_fragments);
        if left_text.is_empty() && right_text.is_empty() {
            return Ok(None);
        }

        let left_vector = self
            .text_vector(&left_text)
            .with_context(|| format!("failed to embed text of {}", left.id))?;
        let right_vector = self
            .text_vector(&right_text)
            .with_context(|| format!("failed to embed text of {}", right.id))?;

        Ok(Some(cosine_similarity(&left_vector, &right_vector)?))
    }

    fn text_vector(&self, text: &NormalizedText) -> Result<Arc<Vec<f32>>> {
        let key = vector_cache_key(&self.cache_namespace, &text.text);
        if let Some(vector) = self.memo.lookup(&key) {
            return Ok(vector);
        }

        let vector = match self.external.get(&key) {
            Some(vector) => vector,
            None => {
                let vector = self.embeddings.embed_text(text)?;
                self.external.put(&key, &vector);
                vector
            }
        };

        let vector = Arc::new(vector);
        self.memo.insert(&key, Arc::clone(&vector));
        Ok(vector)
    }
}

#[cfg(test)]
mod tests;
