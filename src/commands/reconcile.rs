use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use claimrecon::cache::{NoopVectorCache, SqliteVectorCache, VectorCache};
use claimrecon::config::ReconcileConfig;
use claimrecon::embedding::{EmbeddingSource, load_embeddings};
use claimrecon::model::ClaimRecord;
use claimrecon::reconcile::{Reconciler, RunStats};
use claimrecon::report::{CsvReport, NoopReport};
use claimrecon::util::{
    ensure_directory, now_utc_string, read_json, utc_compact_string, write_json_pretty,
};

use crate::cli::ReconcileArgs;

#[derive(Debug, Serialize)]
struct ReconcileRunManifest {
    manifest_version: u32,
    run_id: String,
    started_at: String,
    completed_at: String,
    records_path: String,
    pairs_path: String,
    report_path: Option<String>,
    model_id: String,
    embedding_backend: String,
    cache_db: Option<String>,
    config: ReconcileConfig,
    stats: RunStats,
    status: String,
}

pub fn run(args: ReconcileArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let manifest_dir = args.output_root.join("manifests");
    ensure_directory(&manifest_dir)?;

    let records: Vec<ClaimRecord> = read_json(&args.records_path)
        .with_context(|| format!("failed to load claim records: {}", args.records_path.display()))?;
    let started_at = now_utc_string();
    let run_id = format!("reconcile-{}", utc_compact_string(Utc::now()));

    let source = EmbeddingSource {
        backend: args.backend.into(),
        vectors_path: args.vectors_path.clone(),
        vocab_path: args.vocab_path.clone(),
        dimension: args.dimension,
    };
    let embeddings = load_embeddings(&source)?;

    let cache_db = (!args.no_cache).then(|| {
        args.cache_db
            .clone()
            .unwrap_or_else(|| args.output_root.join("vector_cache.sqlite"))
    });
    let cache = open_cache(cache_db.as_ref());

    info!(
        run_id = %run_id,
        records = records.len(),
        model_id = %embeddings.model_id(),
        backend = source.backend.as_str(),
        "loaded reconciliation inputs"
    );

    let pairs_path = args
        .pairs_path
        .clone()
        .unwrap_or_else(|| args.output_root.join("pairs.json"));
    let report_path = (!args.no_report).then(|| {
        args.report_path
            .clone()
            .unwrap_or_else(|| args.output_root.join("report.csv"))
    });

    let reconciler = Reconciler::new(config.clone(), embeddings.as_ref(), cache.as_ref())?;
    let outcome = match report_path.as_deref() {
        Some(path) => {
            let mut report = CsvReport::create(path)?;
            reconciler.run(&records, &mut report)?
        }
        None => reconciler.run(&records, &mut NoopReport)?,
    };

    write_json_pretty(&pairs_path, &outcome.pairs)?;

    let manifest = ReconcileRunManifest {
        manifest_version: 1,
        run_id,
        started_at,
        completed_at: now_utc_string(),
        records_path: args.records_path.display().to_string(),
        pairs_path: pairs_path.display().to_string(),
        report_path: report_path.as_ref().map(|path| path.display().to_string()),
        model_id: embeddings.model_id().to_string(),
        embedding_backend: source.backend.as_str().to_string(),
        cache_db: cache_db.as_ref().map(|path| path.display().to_string()),
        config,
        stats: outcome.stats,
        status: "completed".to_string(),
    };

    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!(
            "reconcile_run_{}.json",
            utc_compact_string(Utc::now())
        ))
    });
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        path = %manifest_path.display(),
        pairs_path = %pairs_path.display(),
        accepted = outcome.pairs.len(),
        "reconcile run completed"
    );

    Ok(())
}

fn open_cache(cache_db: Option<&PathBuf>) -> Box<dyn VectorCache> {
    let Some(path) = cache_db else {
        info!("vector cache disabled by flag");
        return Box::new(NoopVectorCache);
    };

    let opened = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(ensure_directory)
        .transpose()
        .and_then(|_| SqliteVectorCache::open(path));

    match opened {
        Ok(cache) => Box::new(cache),
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %format!("{err:#}"),
                "vector cache unavailable; continuing without it"
            );
            Box::new(NoopVectorCache)
        }
    }
}

fn resolve_config(args: &ReconcileArgs) -> Result<ReconcileConfig> {
    let mut config = match args.config_path.as_deref() {
        Some(path) => ReconcileConfig::load(path)?,
        None => ReconcileConfig::default(),
    };

    if let Some(theta) = args.theta {
        config.theta = theta;
    }
    if let Some(weight) = args.entity_weight {
        config.weights.entity = weight;
    }
    if let Some(weight) = args.keyword_weight {
        config.weights.keyword = weight;
    }
    if let Some(weight) = args.link_weight {
        config.weights.link = weight;
    }
    if let Some(weight) = args.text_weight {
        config.weights.text = weight;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.sample_size.is_some() {
        config.sample_size = args.sample_size;
    }
    if let Some(aggregation) = args.aggregation {
        config.aggregation = aggregation.into();
    }
    if args.all_unigrams {
        config.top_k_unigrams = None;
    } else if args.top_k_unigrams.is_some() {
        config.top_k_unigrams = args.top_k_unigrams;
    }
    if args.sequential {
        config.parallel = false;
    }
    if args.no_pair_memo {
        config.memoize_pairs = false;
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, Commands};

    fn parse(extra: &[&str]) -> ReconcileArgs {
        let mut argv = vec!["claimrecon", "reconcile", "--records-path", "claims.json"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Reconcile(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn flags_override_defaults() {
        let config = resolve_config(&parse(&[
            "--theta",
            "0.5",
            "--text-weight",
            "2",
            "--sample-size",
            "100",
            "--seed",
            "42",
            "--aggregation",
            "arithmetic",
            "--all-unigrams",
            "--sequential",
        ]))
        .expect("config");

        assert_eq!(config.theta, 0.5);
        assert_eq!(config.weights.text, 2.0);
        assert_eq!(config.weights.entity, 1.0);
        assert_eq!(config.sample_size, Some(100));
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.top_k_unigrams, None);
        assert!(!config.parallel);
        assert!(config.memoize_pairs);
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        assert!(resolve_config(&parse(&["--theta", "1.5"])).is_err());
        assert!(resolve_config(&parse(&["--sample-size", "0"])).is_err());
    }

    #[test]
    fn disabled_cache_falls_back_to_noop() {
        let cache = open_cache(None);
        assert!(cache.get("missing").expect("noop get").is_none());
    }
}
