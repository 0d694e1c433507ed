use std::path::Path;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::prune::DEFAULT_REVIEW_DATE_TOLERANCE_DAYS;
use crate::text::DEFAULT_TOP_K_UNIGRAMS;
use crate::util::read_json;

pub const DEFAULT_THETA: f64 = 0.3;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Aggregation {
    #[default]
    Geometric,
    Arithmetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureWeights {
    pub entity: f64,
    pub keyword: f64,
    pub link: f64,
    pub text: f64,
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            entity: 1.0,
            keyword: 1.0,
            link: 1.0,
            text: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityBlend {
    pub entity_weight: f64,
    pub category_weight: f64,
    pub category_fallback: f64,
}

impl Default for EntityBlend {
    fn default() -> Self {
        Self {
            entity_weight: 0.7,
            category_weight: 0.3,
            category_fallback: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub theta: f64,
    pub weights: FeatureWeights,
    pub seed: Option<u64>,
    pub sample_size: Option<usize>,
    pub aggregation: Aggregation,
    pub top_k_unigrams: Option<usize>,
    pub entity_blend: EntityBlend,
    pub review_date_tolerance_days: i64,
    pub memoize_pairs: bool,
    pub parallel: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            theta: DEFAULT_THETA,
            weights: FeatureWeights::default(),
            seed: None,
            sample_size: None,
            aggregation: Aggregation::default(),
            top_k_unigrams: Some(DEFAULT_TOP_K_UNIGRAMS),
            entity_blend: EntityBlend::default(),
            review_date_tolerance_days: DEFAULT_REVIEW_DATE_TOLERANCE_DAYS,
            memoize_pairs: true,
            parallel: true,
        }
    }
}

impl ReconcileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = read_json(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.theta.is_finite() || self.theta <= 0.0 || self.theta >= 1.0 {
            bail!("theta must lie strictly between 0 and 1, got {}", self.theta);
        }

        let weights = [
            ("entity", self.weights.entity),
            ("keyword", self.weights.keyword),
            ("link", self.weights.link),
            ("text", self.weights.text),
        ];
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                bail!("{name} weight must be a non-negative number, got {weight}");
            }
        }

        let blend = self.entity_blend;
        for (name, value) in [
            ("entity_blend.entity_weight", blend.entity_weight),
            ("entity_blend.category_weight", blend.category_weight),
            ("entity_blend.category_fallback", blend.category_fallback),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!("{name} must be a non-negative number, got {value}");
            }
        }

        if self.sample_size == Some(0) {
            bail!("sample_size must be positive when set");
        }

        if self.review_date_tolerance_days < 0 {
            bail!(
                "review_date_tolerance_days must not be negative, got {}",
                self.review_date_tolerance_days
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ReconcileConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.top_k_unigrams, Some(20));
        assert!(config.sample_size.is_none());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: ReconcileConfig =
            serde_json::from_str(r#"{"theta": 0.5, "weights": {"text": 2.0}, "seed": 42}"#)
                .expect("config deserializes");
        assert_eq!(config.theta, 0.5);
        assert_eq!(config.weights.text, 2.0);
        assert_eq!(config.weights.entity, 1.0);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.aggregation, Aggregation::Geometric);
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut config = ReconcileConfig {
            theta: 1.0,
            ..ReconcileConfig::default()
        };
        assert!(config.validate().is_err());

        config.theta = 0.3;
        config.weights.link = -0.1;
        assert!(config.validate().is_err());

        config.weights.link = 1.0;
        config.sample_size = Some(0);
        assert!(config.validate().is_err());
    }
}
