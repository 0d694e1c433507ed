use anyhow::Result;
use tracing::{info, warn};

use claimrecon::cache::SqliteVectorCache;

use crate::cli::CacheStatusArgs;

pub fn run(args: CacheStatusArgs) -> Result<()> {
    let cache_db = args
        .cache_db
        .clone()
        .unwrap_or_else(|| args.output_root.join("vector_cache.sqlite"));

    if !cache_db.exists() {
        warn!(path = %cache_db.display(), "vector cache database missing");
        return Ok(());
    }

    let stats = SqliteVectorCache::open(&cache_db)?.stats()?;
    let dimensions = stats
        .dimensions
        .iter()
        .map(|dimension| dimension.to_string())
        .collect::<Vec<String>>()
        .join(",");

    info!(
        path = %cache_db.display(),
        vectors = stats.vector_count,
        dimensions = %dimensions,
        "vector cache status"
    );

    Ok(())
}
