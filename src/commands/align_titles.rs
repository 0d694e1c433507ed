use anyhow::{Context, Result};
use tracing::info;

use claimrecon::model::ClaimRecord;
use claimrecon::reconcile::align_duplicate_titles;
use claimrecon::util::{read_json, write_json_pretty};

use crate::cli::AlignTitlesArgs;

pub fn run(args: AlignTitlesArgs) -> Result<()> {
    let records: Vec<ClaimRecord> = read_json(&args.records_path)
        .with_context(|| format!("failed to load claim records: {}", args.records_path.display()))?;

    let pairs = align_duplicate_titles(&records);
    let pairs_path = args
        .pairs_path
        .clone()
        .unwrap_or_else(|| args.output_root.join("title_pairs.json"));
    write_json_pretty(&pairs_path, &pairs)?;

    info!(
        path = %pairs_path.display(),
        records = records.len(),
        pairs = pairs.len(),
        "title duplicates written"
    );

    Ok(())
}
