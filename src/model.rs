use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NormalizedRating {
    False,
    Mixture,
    True,
    #[default]
    #[serde(other)]
    Other,
}

impl NormalizedRating {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::False => "FALSE",
            Self::Mixture => "MIXTURE",
            Self::True => "TRUE",
            Self::Other => "OTHER",
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::False => 1,
            Self::Mixture => 2,
            Self::True => 3,
            Self::Other => -1,
        }
    }
}

impl FromStr for NormalizedRating {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value.trim().to_ascii_uppercase().as_str() {
            "FALSE" => Self::False,
            "MIXTURE" => Self::Mixture,
            "TRUE" => Self::True,
            _ => Self::Other,
        })
    }
}

impl fmt::Display for NormalizedRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Records are produced upstream and never mutated here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimRecord {
    pub id: String,
    pub author: String,
    pub review_url: Option<String>,
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_date")]
    pub claim_date: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient_date")]
    pub review_date: Option<NaiveDate>,
    pub text_fragments: Vec<String>,
    pub keywords: Vec<String>,
    pub entities: Vec<String>,
    pub entity_categories: Vec<String>,
    pub links: Vec<String>,
    pub normalized_rating: NormalizedRating,
}

impl ClaimRecord {
    pub fn headline(&self) -> &str {
        self.text_fragments.first().map(String::as_str).unwrap_or("")
    }
}

// Missing or malformed dates become `None` and simply disable the date rules.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| parse_date(&value)))
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let day = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquivalencePair {
    pub score: f64,
    pub id_a: String,
    pub id_b: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FeatureScores {
    pub entity: Option<f64>,
    pub keyword: Option<f64>,
    pub link: Option<f64>,
    pub text: Option<f64>,
}
