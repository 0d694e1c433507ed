use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result, anyhow, bail};

use super::dense::parse_row;
use super::{EmbeddingBackend, EmbeddingProvider, model_id_for, read_lines};

// Rows stay as raw text until a token is first requested.
#[derive(Debug)]
pub struct LazyEmbeddings {
    model_id: String,
    raw_rows: HashMap<String, String>,
    dimension: usize,
    parsed: RwLock<HashMap<String, Arc<Vec<f32>>>>,
}

impl LazyEmbeddings {
    pub fn from_raw_rows(model_id: &str, labels: Vec<String>, rows: Vec<String>) -> Result<Self> {
        if labels.len() != rows.len() {
            bail!(
                "vocabulary has {} labels but vector file has {} rows",
                labels.len(),
                rows.len()
            );
        }

        let Some(first) = rows.first() else {
            bail!("lazy embeddings need at least one vector row");
        };
        let dimension = first.split_whitespace().count();

        let mut raw_rows = HashMap::<String, String>::with_capacity(labels.len());
        for (label, row) in labels.into_iter().zip(rows) {
            raw_rows.entry(label).or_insert(row);
        }

        Ok(Self {
            model_id: model_id.to_string(),
            raw_rows,
            dimension,
            parsed: RwLock::new(HashMap::new()),
        })
    }

    pub fn load_with_vocabulary(vectors_path: &Path, vocab_path: &Path) -> Result<Self> {
        let labels = read_lines(vocab_path)?;
        let rows = read_lines(vectors_path)?
            .into_iter()
            .filter(|line| !line.trim().is_empty())
            .collect::<Vec<String>>();
        Self::from_raw_rows(
            &model_id_for(EmbeddingBackend::Lazy, vectors_path),
            labels,
            rows,
        )
    }

    pub fn load_glove(path: &Path) -> Result<Self> {
        let mut labels = Vec::<String>::new();
        let mut rows = Vec::<String>::new();
        for line in read_lines(path)? {
            let Some((label, values)) = line.split_once(' ') else {
                continue;
            };
            labels.push(label.to_string());
            rows.push(values.trim().to_string());
        }
        Self::from_raw_rows(&model_id_for(EmbeddingBackend::Lazy, path), labels, rows)
    }

    pub fn parsed_count(&self) -> usize {
        self.parsed.read().map(|parsed| parsed.len()).unwrap_or(0)
    }
}

impl EmbeddingProvider for LazyEmbeddings {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn vector(&self, token: &str) -> Result<Vec<f32>> {
        {
            let parsed = self
                .parsed
                .read()
                .map_err(|_| anyhow!("lazy embedding memo lock poisoned"))?;
            if let Some(vector) = parsed.get(token) {
                return Ok(vector.as_ref().clone());
            }
        }

        let Some(raw) = self.raw_rows.get(token) else {
            return Ok(vec![0_f32; self.dimension]);
        };
        let vector = Arc::new(
            parse_row(raw).with_context(|| format!("failed to parse vector for '{token}'"))?,
        );

        let mut parsed = self
            .parsed
            .write()
            .map_err(|_| anyhow!("lazy embedding memo lock poisoned"))?;
        let entry = parsed
            .entry(token.to_string())
            .or_insert_with(|| Arc::clone(&vector));
        Ok(entry.as_ref().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> LazyEmbeddings {
        LazyEmbeddings::from_raw_rows(
            "lazy:test",
            vec!["vaccines".to_string(), "safe".to_string(), "broken".to_string()],
            vec!["1 0 0".to_string(), "0 1 0".to_string(), "0 x 1".to_string()],
        )
        .expect("rows agree")
    }

    #[test]
    fn rows_are_parsed_on_first_use_and_memoized() {
        let provider = provider();
        assert_eq!(provider.parsed_count(), 0);
        assert_eq!(provider.vector("safe").expect("parses"), vec![0.0, 1.0, 0.0]);
        assert_eq!(provider.vector("safe").expect("parses"), vec![0.0, 1.0, 0.0]);
        assert_eq!(provider.parsed_count(), 1);
    }

    #[test]
    fn dimension_comes_from_first_row_and_unknown_tokens_are_zero() {
        let provider = provider();
        assert_eq!(provider.dimension(), 3);
        assert_eq!(provider.vector("flu").expect("lookup"), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn malformed_row_surfaces_as_error() {
        assert!(provider().vector("broken").is_err());
    }

    #[test]
    fn empty_source_is_rejected() {
        assert!(LazyEmbeddings::from_raw_rows("lazy:test", Vec::new(), Vec::new()).is_err());
    }
}
