use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};

use super::{EmbeddingBackend, EmbeddingProvider, model_id_for, read_lines};

#[derive(Debug, Clone)]
pub struct DenseEmbeddings {
    model_id: String,
    vocabulary: HashMap<String, usize>,
    dimension: usize,
    matrix: Vec<f32>,
}

impl DenseEmbeddings {
    pub fn from_rows(model_id: &str, labels: Vec<String>, rows: Vec<Vec<f32>>) -> Result<Self> {
        if labels.len() != rows.len() {
            bail!(
                "vocabulary has {} labels but matrix has {} rows",
                labels.len(),
                rows.len()
            );
        }

        let dimension = rows.first().map(Vec::len).unwrap_or(0);
        let mut matrix = Vec::<f32>::with_capacity(dimension * rows.len());
        for (index, row) in rows.iter().enumerate() {
            if row.len() != dimension {
                bail!(
                    "matrix row {index} has {} values, expected {dimension}",
                    row.len()
                );
            }
            matrix.extend_from_slice(row);
        }

        let mut vocabulary = HashMap::<String, usize>::with_capacity(labels.len());
        for (index, label) in labels.into_iter().enumerate() {
            vocabulary.entry(label).or_insert(index);
        }

        Ok(Self {
            model_id: model_id.to_string(),
            vocabulary,
            dimension,
            matrix,
        })
    }

    pub fn load(vectors_path: &Path, vocab_path: &Path) -> Result<Self> {
        let labels = read_lines(vocab_path)?;
        let rows = read_lines(vectors_path)?
            .iter()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(line_no, line)| {
                parse_row(line).with_context(|| {
                    format!(
                        "failed to parse matrix row {} in {}",
                        line_no + 1,
                        vectors_path.display()
                    )
                })
            })
            .collect::<Result<Vec<Vec<f32>>>>()?;

        Self::from_rows(
            &model_id_for(EmbeddingBackend::Dense, vectors_path),
            labels,
            rows,
        )
    }
}

impl EmbeddingProvider for DenseEmbeddings {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn vector(&self, token: &str) -> Result<Vec<f32>> {
        match self.vocabulary.get(token) {
            Some(&row) => {
                let start = row * self.dimension;
                Ok(self.matrix[start..start + self.dimension].to_vec())
            }
            None => Ok(vec![0_f32; self.dimension]),
        }
    }
}

pub(super) fn parse_row(line: &str) -> Result<Vec<f32>> {
    line.split_whitespace()
        .map(|value| {
            value
                .parse::<f32>()
                .with_context(|| format!("invalid vector component '{value}'"))
        })
        .collect()
}
