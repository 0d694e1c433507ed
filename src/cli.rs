use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use claimrecon::config::Aggregation;
use claimrecon::embedding::EmbeddingBackend;

#[derive(Parser, Debug)]
#[command(
    name = "claimrecon",
    version,
    about = "Entity resolution over fact-checked claim records"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Reconcile(ReconcileArgs),
    AlignTitles(AlignTitlesArgs),
    CacheStatus(CacheStatusArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum BackendArg {
    Dense,
    Lazy,
    Sentence,
}

impl From<BackendArg> for EmbeddingBackend {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Dense => Self::Dense,
            BackendArg::Lazy => Self::Lazy,
            BackendArg::Sentence => Self::Sentence,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum AggregationArg {
    Geometric,
    Arithmetic,
}

impl From<AggregationArg> for Aggregation {
    fn from(value: AggregationArg) -> Self {
        match value {
            AggregationArg::Geometric => Self::Geometric,
            AggregationArg::Arithmetic => Self::Arithmetic,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ReconcileArgs {
    #[arg(long)]
    pub records_path: PathBuf,

    #[arg(long, default_value = ".cache/claimrecon")]
    pub output_root: PathBuf,

    #[arg(long)]
    pub config_path: Option<PathBuf>,

    #[arg(long)]
    pub pairs_path: Option<PathBuf>,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub no_report: bool,

    #[arg(long)]
    pub theta: Option<f64>,

    #[arg(long)]
    pub entity_weight: Option<f64>,

    #[arg(long)]
    pub keyword_weight: Option<f64>,

    #[arg(long)]
    pub link_weight: Option<f64>,

    #[arg(long)]
    pub text_weight: Option<f64>,

    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long)]
    pub sample_size: Option<usize>,

    #[arg(long, value_enum)]
    pub aggregation: Option<AggregationArg>,

    #[arg(long)]
    pub top_k_unigrams: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub all_unigrams: bool,

    #[arg(long, value_enum, default_value_t = BackendArg::Sentence)]
    pub backend: BackendArg,

    #[arg(long)]
    pub vectors_path: Option<PathBuf>,

    #[arg(long)]
    pub vocab_path: Option<PathBuf>,

    #[arg(long)]
    pub dimension: Option<usize>,

    #[arg(long)]
    pub cache_db: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub no_cache: bool,

    #[arg(long, default_value_t = false)]
    pub sequential: bool,

    #[arg(long, default_value_t = false)]
    pub no_pair_memo: bool,
}

#[derive(Args, Debug, Clone)]
pub struct AlignTitlesArgs {
    #[arg(long)]
    pub records_path: PathBuf,

    #[arg(long, default_value = ".cache/claimrecon")]
    pub output_root: PathBuf,

    #[arg(long)]
    pub pairs_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CacheStatusArgs {
    #[arg(long, default_value = ".cache/claimrecon")]
    pub output_root: PathBuf,

    #[arg(long)]
    pub cache_db: Option<PathBuf>,
}
