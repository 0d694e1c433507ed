use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use chrono::NaiveDate;

use super::*;
use crate::cache::{NoopVectorCache, SqliteVectorCache};
use crate::embedding::DenseEmbeddings;

struct CountingProvider {
    inner: DenseEmbeddings,
    embeds: AtomicUsize,
}

impl CountingProvider {
    fn new() -> Self {
        Self {
            inner: vaccine_embeddings(),
            embeds: AtomicUsize::new(0),
        }
    }
}

impl EmbeddingProvider for CountingProvider {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn vector(&self, token: &str) -> Result<Vec<f32>> {
        self.inner.vector(token)
    }

    fn embed_text(&self, text: &NormalizedText) -> Result<Vec<f32>> {
        self.embeds.fetch_add(1, Ordering::Relaxed);
        self.inner.embed_tokens(&text.tokens)
    }
}

struct WrongDimensionProvider;

impl EmbeddingProvider for WrongDimensionProvider {
    fn model_id(&self) -> &str {
        "broken"
    }

    fn dimension(&self) -> usize {
        3
    }

    fn vector(&self, _token: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0])
    }
}

fn vaccine_embeddings() -> DenseEmbeddings {
    DenseEmbeddings::from_rows(
        "dense:vaccines",
        vec![
            "vaccines".to_string(),
            "safe".to_string(),
            "effective".to_string(),
        ],
        vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ],
    )
    .expect("rows agree")
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn vaccine_pair() -> (ClaimRecord, ClaimRecord) {
    let date = NaiveDate::from_ymd_opt(2020, 1, 1);
    let left = ClaimRecord {
        id: "claim-a".to_string(),
        author: "X".to_string(),
        claim_date: date,
        text_fragments: strings(&["Vaccines are safe"]),
        keywords: strings(&["vaccine", "covid"]),
        links: strings(&["http://a.com"]),
        ..ClaimRecord::default()
    };
    let right = ClaimRecord {
        id: "claim-b".to_string(),
        author: "X".to_string(),
        claim_date: date,
        text_fragments: strings(&["Vaccines are safe and effective"]),
        keywords: strings(&["vaccine", "flu"]),
        links: strings(&["http://a.com"]),
        ..ClaimRecord::default()
    };
    (left, right)
}

#[test]
fn near_duplicate_claims_score_above_theta() {
    let embeddings = vaccine_embeddings();
    let config = ReconcileConfig::default();
    let scorer = PairScorer::new(&config, &embeddings, &NoopVectorCache).expect("scorer");
    let (left, right) = vaccine_pair();

    let features = scorer.feature_scores(&left, &right).expect("scores");
    assert_eq!(features.entity, None);
    assert_eq!(features.keyword, Some(0.25));
    assert_eq!(features.link, Some(0.5));
    assert!(features.text.expect("text applies") > 0.8);

    let score = scorer.aggregate(&features);
    assert!(score > config.theta);
    assert!((score - scorer.score(&left, &right).expect("score")).abs() < 1e-12);
}

#[test]
fn keyword_similarity_is_not_applicable_when_both_sets_are_empty() {
    let embeddings = vaccine_embeddings();
    let scorer =
        PairScorer::new(&ReconcileConfig::default(), &embeddings, &NoopVectorCache).expect("scorer");
    let (mut left, mut right) = vaccine_pair();
    left.keywords.clear();
    right.keywords.clear();

    let features = scorer.feature_scores(&left, &right).expect("scores");
    assert_eq!(features.keyword, None);
}

#[test]
fn entity_similarity_blends_entities_and_categories() {
    let embeddings = vaccine_embeddings();
    let scorer =
        PairScorer::new(&ReconcileConfig::default(), &embeddings, &NoopVectorCache).expect("scorer");
    let (mut left, mut right) = vaccine_pair();

    left.entity_categories = strings(&["Vaccination"]);
    right.entity_categories = strings(&["Vaccination"]);
    let fallback = scorer.entity_similarity(&left, &right).expect("category applies");
    assert!((fallback - 0.3 * 0.5).abs() < 1e-12);

    left.entities = strings(&["dbr:Vaccine", "dbr:CDC"]);
    right.entities = strings(&["dbr:Vaccine"]);
    let blended = scorer.entity_similarity(&left, &right).expect("entities apply");
    let entity = 1.0 / 3.0;
    assert!((blended - (0.7 * entity + 0.3 * 0.5)).abs() < 1e-12);

    left.entity_categories.clear();
    right.entity_categories.clear();
    let plain = scorer.entity_similarity(&left, &right).expect("entities apply");
    assert!((plain - entity).abs() < 1e-12);
}

#[test]
fn text_similarity_is_not_applicable_without_any_text() {
    let embeddings = vaccine_embeddings();
    let scorer =
        PairScorer::new(&ReconcileConfig::default(), &embeddings, &NoopVectorCache).expect("scorer");
    let (mut left, mut right) = vaccine_pair();
    left.text_fragments.clear();
    right.text_fragments = strings(&["the of and"]);

    assert_eq!(scorer.text_similarity(&left, &right).expect("no error"), None);
}

#[test]
fn repeated_texts_are_embedded_once_per_run() {
    let provider = CountingProvider::new();
    let scorer =
        PairScorer::new(&ReconcileConfig::default(), &provider, &NoopVectorCache).expect("scorer");
    let (left, right) = vaccine_pair();

    scorer.score(&left, &right).expect("score");
    scorer.score(&right, &left).expect("score");
    assert_eq!(provider.embeds.load(Ordering::Relaxed), 2);
}

#[test]
fn external_cache_hits_skip_embedding_without_changing_scores() {
    let cache = SqliteVectorCache::open_in_memory().expect("cache");
    let config = ReconcileConfig::default();
    let (left, right) = vaccine_pair();

    let cold_provider = CountingProvider::new();
    let cold = PairScorer::new(&config, &cold_provider, &cache).expect("scorer");
    let cold_score = cold.score(&left, &right).expect("score");
    assert_eq!(cold_provider.embeds.load(Ordering::Relaxed), 2);

    let warm_provider = CountingProvider::new();
    let warm = PairScorer::new(&config, &warm_provider, &cache).expect("scorer");
    let warm_score = warm.score(&left, &right).expect("score");
    assert_eq!(warm_provider.embeds.load(Ordering::Relaxed), 0);
    assert_eq!(cold_score.to_bits(), warm_score.to_bits());

    let uncached = PairScorer::new(&config, &vaccine_embeddings(), &NoopVectorCache)
        .expect("scorer")
        .score(&left, &right)
        .expect("score");
    assert_eq!(uncached.to_bits(), cold_score.to_bits());
}

#[test]
fn dimension_mismatch_is_reported_as_error() {
    let scorer = PairScorer::new(
        &ReconcileConfig::default(),
        &WrongDimensionProvider,
        &NoopVectorCache,
    )
    .expect("scorer");
    let (left, right) = vaccine_pair();
    assert!(scorer.score(&left, &right).is_err());
}

#[test]
fn arithmetic_aggregation_can_be_selected() {
    let embeddings = vaccine_embeddings();
    let config = ReconcileConfig {
        aggregation: Aggregation::Arithmetic,
        ..ReconcileConfig::default()
    };
    let scorer = PairScorer::new(&config, &embeddings, &NoopVectorCache).expect("scorer");
    let features = FeatureScores {
        entity: None,
        keyword: Some(0.25),
        link: Some(0.5),
        text: Some(1.0),
    };
    assert!((scorer.aggregate(&features) - 1.75 / 4.0).abs() < 1e-12);
}

#[test]
fn link_similarity_is_not_applicable_without_citations() {
    let embeddings = vaccine_embeddings();
    let config = ReconcileConfig::default();
    let scorer = PairScorer::new(&config, &embeddings, &NoopVectorCache).expect("scorer");
    let (mut left, mut right) = vaccine_pair();
    left.links.clear();
    right.links.clear();
    right.text_fragments = left.text_fragments.clone();
    right.keywords = left.keywords.clone();

    let features = scorer.feature_scores(&left, &right).expect("scores");
    assert_eq!(features.link, None);
    assert_eq!(features.keyword, Some(0.5));

    let score = scorer.aggregate(&features);
    assert!((score - 0.5_f64.powf(0.25)).abs() < 1e-6);
    assert!(score > config.theta);
}
