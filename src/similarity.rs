use anyhow::{Result, bail};

pub const SCORE_FLOOR: f64 = 0.00001;

pub fn overlap_count<T: PartialEq>(left: &[T], right: &[T]) -> usize {
    left.iter()
        .map(|left_item| {
            right
                .iter()
                .filter(|right_item| *right_item == left_item)
                .count()
        })
        .sum()
}

// Denominator is the sum of both sizes, not the union size.
pub fn jaccard<T: PartialEq>(left: &[T], right: &[T]) -> f64 {
    let total = left.len() + right.len();
    if total == 0 {
        return 0.0;
    }
    overlap_count(left, right) as f64 / total as f64
}

// "Not applicable" when both sides are empty.
pub fn optional_jaccard<T: PartialEq>(left: &[T], right: &[T]) -> Option<f64> {
    if left.is_empty() && right.is_empty() {
        None
    } else {
        Some(jaccard(left, right))
    }
}

// Skipped slots still count in the exponent's denominator.
pub fn weighted_geometric_mean(terms: &[(Option<f64>, f64)]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }

    let product = terms
        .iter()
        .filter_map(|(value, weight)| value.map(|value| value.max(SCORE_FLOOR).powf(*weight)))
        .product::<f64>();

    product.powf(1.0 / terms.len() as f64)
}

pub fn weighted_arithmetic_mean(terms: &[(Option<f64>, f64)]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }

    let sum = terms
        .iter()
        .filter_map(|(value, weight)| value.map(|value| value * weight))
        .sum::<f64>();

    sum / terms.len() as f64
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> Result<f64> {
    if left.len() != right.len() {
        bail!(
            "vector dimension mismatch: {} vs {}",
            left.len(),
            right.len()
        );
    }

    let mut dot = 0.0_f64;
    let mut left_norm = 0.0_f64;
    let mut right_norm = 0.0_f64;
    for (left_value, right_value) in left.iter().zip(right.iter()) {
        let (l, r) = (f64::from(*left_value), f64::from(*right_value));
        dot += l * r;
        left_norm += l * l;
        right_norm += r * r;
    }

    if left_norm <= 0.0 || right_norm <= 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (left_norm.sqrt() * right_norm.sqrt()))
}
