use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::Result;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::VectorCache;
use crate::config::ReconcileConfig;
use crate::embedding::EmbeddingProvider;
use crate::model::{ClaimRecord, EquivalencePair};
use crate::prune::{PruneReason, prune_reason};
use crate::report::ReportSink;
use crate::sampler::{CandidateMode, PairCombinations, sample_pairs};
use crate::scorer::PairScorer;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PairOutcome {
    SelfPair,
    Pruned(PruneReason),
    Rejected(f64),
    Accepted(f64),
    Failed,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub records: usize,
    pub mode: String,
    pub seed: Option<u64>,
    pub candidates: u64,
    pub self_pairs: u64,
    pub memo_skipped: u64,
    pub pruned: BTreeMap<String, u64>,
    pub pruned_total: u64,
    pub scored: u64,
    pub accepted: u64,
    pub failed: u64,
    pub cache_disabled: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub pairs: Vec<EquivalencePair>,
    pub stats: RunStats,
}

#[derive(Default)]
struct RunCounters {
    screened: AtomicU64,
    attempted: AtomicU64,
    self_pairs: AtomicU64,
    pruned: [AtomicU64; PruneReason::ALL.len()],
    scored: AtomicU64,
    accepted: AtomicU64,
    failed: AtomicU64,
}

impl RunCounters {
    fn record(&self, outcome: PairOutcome) {
        let counter = match outcome {
            PairOutcome::SelfPair => &self.self_pairs,
            PairOutcome::Pruned(reason) => &self.pruned[prune_slot(reason)],
            PairOutcome::Rejected(_) => &self.scored,
            PairOutcome::Accepted(_) => {
                self.scored.fetch_add(1, Ordering::Relaxed);
                &self.accepted
            }
            PairOutcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

fn prune_slot(reason: PruneReason) -> usize {
    PruneReason::ALL
        .iter()
        .position(|candidate| *candidate == reason)
        .unwrap_or(0)
}

fn log_progress(phase: &str, done: u64, total: u64, counters: &RunCounters) {
    let step = (total / 10).max(1);
    if done % step == 0 {
        info!(
            phase,
            done,
            total,
            accepted = counters.accepted.load(Ordering::Relaxed),
            "reconciliation progress"
        );
    }
}

// Unordered pairs keyed by the sorted concatenation of both ids.
#[derive(Default)]
struct PairMemo {
    seen: HashSet<String>,
}

impl PairMemo {
    fn first_visit(&mut self, left_id: &str, right_id: &str) -> bool {
        let key = if left_id <= right_id {
            format!("{left_id}\u{1f}{right_id}")
        } else {
            format!("{right_id}\u{1f}{left_id}")
        };
        self.seen.insert(key)
    }
}

pub struct Reconciler<'a> {
    config: ReconcileConfig,
    scorer: PairScorer<'a>,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        config: ReconcileConfig,
        embeddings: &'a dyn EmbeddingProvider,
        cache: &'a dyn VectorCache,
    ) -> Result<Self> {
        config.validate()?;
        let scorer = PairScorer::new(&config, embeddings, cache)?;
        Ok(Self { config, scorer })
    }

    pub fn scorer(&self) -> &PairScorer<'a> {
        &self.scorer
    }

    // Screening and scoring may run in parallel; the pair memo is applied
    // between them in enumeration order, so repeated ids resolve the same way
    // on every run.
    pub fn run(
        &self,
        records: &[ClaimRecord],
        report: &mut dyn ReportSink,
    ) -> Result<ReconcileOutcome> {
        let started = Instant::now();
        let mode = CandidateMode::from_config(self.config.sample_size, self.config.seed);
        let total = mode.candidate_count(records.len());
        let parallel = self.config.parallel;
        let counters = RunCounters::default();

        info!(
            records = records.len(),
            mode = mode.as_str(),
            seed = ?mode.seed(),
            candidates = total,
            theta = self.config.theta,
            parallel,
            "starting reconciliation"
        );

        report.begin()?;

        let screen = |(left, right): (usize, usize)| -> Option<(usize, usize)> {
            let outcome = self.screen_pair(&records[left], &records[right]);
            if let Some(outcome) = outcome {
                counters.record(outcome);
            }
            let screened = counters.screened.fetch_add(1, Ordering::Relaxed) + 1;
            log_progress("screen", screened, total, &counters);
            outcome.is_none().then_some((left, right))
        };

        let count = records.len();
        let survivors = match (mode, parallel) {
            (CandidateMode::Exhaustive, true) => (0..count)
                .into_par_iter()
                .flat_map_iter(|left| (left + 1..count).map(move |right| (left, right)))
                .filter_map(&screen)
                .collect::<Vec<(usize, usize)>>(),
            (CandidateMode::Exhaustive, false) => PairCombinations::new(count)
                .filter_map(&screen)
                .collect::<Vec<(usize, usize)>>(),
            (CandidateMode::Sampled { sample_size, seed }, true) => {
                sample_pairs(count, sample_size, seed)
                    .into_par_iter()
                    .filter_map(&screen)
                    .collect::<Vec<(usize, usize)>>()
            }
            (CandidateMode::Sampled { sample_size, seed }, false) => {
                sample_pairs(count, sample_size, seed)
                    .into_iter()
                    .filter_map(&screen)
                    .collect::<Vec<(usize, usize)>>()
            }
        };

        let survivor_count = survivors.len();
        let candidates = self.drop_repeated_pairs(records, survivors);
        let memo_skipped = (survivor_count - candidates.len()) as u64;
        let scoring_total = candidates.len() as u64;

        info!(
            survivors = survivor_count,
            memo_skipped,
            to_score = scoring_total,
            "screening completed"
        );

        let score = |(left, right): (usize, usize)| -> Option<(usize, usize, f64)> {
            let outcome = self.score_pair(&records[left], &records[right]);
            counters.record(outcome);
            let attempted = counters.attempted.fetch_add(1, Ordering::Relaxed) + 1;
            log_progress("score", attempted, scoring_total, &counters);
            match outcome {
                PairOutcome::Accepted(score) => Some((left, right, score)),
                _ => None,
            }
        };

        let mut accepted = if parallel {
            candidates
                .into_par_iter()
                .filter_map(&score)
                .collect::<Vec<(usize, usize, f64)>>()
        } else {
            candidates
                .into_iter()
                .filter_map(&score)
                .collect::<Vec<(usize, usize, f64)>>()
        };
        accepted.sort_by(|left, right| (left.0, left.1).cmp(&(right.0, right.1)));

        let mut pairs = Vec::<EquivalencePair>::with_capacity(accepted.len());
        for (left, right, score) in accepted {
            report.write_pair(score, &records[left], &records[right])?;
            pairs.push(EquivalencePair {
                score,
                id_a: records[left].id.clone(),
                id_b: records[right].id.clone(),
            });
        }
        report.finish()?;

        let pruned = PruneReason::ALL
            .iter()
            .map(|reason| {
                (
                    reason.as_str().to_string(),
                    counters.pruned[prune_slot(*reason)].load(Ordering::Relaxed),
                )
            })
            .collect::<BTreeMap<String, u64>>();

        let stats = RunStats {
            records: records.len(),
            mode: mode.as_str().to_string(),
            seed: mode.seed(),
            candidates: counters.screened.load(Ordering::Relaxed),
            self_pairs: counters.self_pairs.load(Ordering::Relaxed),
            memo_skipped,
            pruned_total: pruned.values().sum(),
            pruned,
            scored: counters.scored.load(Ordering::Relaxed),
            accepted: counters.accepted.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            cache_disabled: self.scorer.cache_disabled(),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            candidates = stats.candidates,
            pruned = stats.pruned_total,
            scored = stats.scored,
            accepted = stats.accepted,
            failed = stats.failed,
            memo_skipped = stats.memo_skipped,
            cache_disabled = stats.cache_disabled,
            duration_ms = stats.duration_ms,
            "reconciliation completed"
        );

        Ok(ReconcileOutcome { pairs, stats })
    }

    pub fn evaluate_pair(&self, left: &ClaimRecord, right: &ClaimRecord) -> PairOutcome {
        self.screen_pair(left, right)
            .unwrap_or_else(|| self.score_pair(left, right))
    }

    fn screen_pair(&self, left: &ClaimRecord, right: &ClaimRecord) -> Option<PairOutcome> {
        if left.id == right.id {
            return Some(PairOutcome::SelfPair);
        }
        prune_reason(left, right, self.config.review_date_tolerance_days).map(PairOutcome::Pruned)
    }

    fn score_pair(&self, left: &ClaimRecord, right: &ClaimRecord) -> PairOutcome {
        match self.scorer.score(left, right) {
            Ok(score) if score > self.config.theta => PairOutcome::Accepted(score),
            Ok(score) => PairOutcome::Rejected(score),
            Err(err) => {
                warn!(
                    left = %left.id,
                    right = %right.id,
                    error = %format!("{err:#}"),
                    "pair scoring failed; skipping"
                );
                PairOutcome::Failed
            }
        }
    }

    // Keeps the first occurrence of each unordered id pair; `survivors` must be
    // in enumeration order.
    fn drop_repeated_pairs(
        &self,
        records: &[ClaimRecord],
        survivors: Vec<(usize, usize)>,
    ) -> Vec<(usize, usize)> {
        if !self.config.memoize_pairs {
            return survivors;
        }

        let mut memo = PairMemo::default();
        survivors
            .into_iter()
            .filter(|(left, right)| memo.first_visit(&records[*left].id, &records[*right].id))
            .collect::<Vec<(usize, usize)>>()
    }
}

pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase().replace(['"', '\''], "")
}

pub fn align_duplicate_titles(records: &[ClaimRecord]) -> Vec<EquivalencePair> {
    let titles = records
        .iter()
        .map(|record| {
            record
                .title
                .as_deref()
                .map(normalize_title)
                .filter(|title| !title.is_empty())
        })
        .collect::<Vec<Option<String>>>();

    let pairs = PairCombinations::new(records.len())
        .filter(|(left, right)| {
            records[*left].id != records[*right].id
                && matches!((&titles[*left], &titles[*right]), (Some(a), Some(b)) if a == b)
        })
        .map(|(left, right)| EquivalencePair {
            score: 1.0,
            id_a: records[left].id.clone(),
            id_b: records[right].id.clone(),
        })
        .collect::<Vec<EquivalencePair>>();

    info!(
        records = records.len(),
        pairs = pairs.len(),
        "title alignment completed"
    );
    pairs
}
