use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable description of a binary-outcome prediction market question.
///
/// Immutable input to a pipeline; acquiring one is out of scope for this
/// engine (see spec §1 "Out of scope: market discovery and URL parsing").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDescriptor {
    pub slug: String,
    pub question: String,
    /// Current YES price, in [0, 1].
    pub yes_odds: f64,
    pub volume: Option<f64>,
    pub end_date: Option<DateTime<Utc>>,
}

impl MarketDescriptor {
    pub fn new(slug: impl Into<String>, question: impl Into<String>, yes_odds: f64) -> Self {
        Self {
            slug: slug.into(),
            question: question.into(),
            yes_odds,
            volume: None,
            end_date: None,
        }
    }

    /// Basic shape validation: slug/question non-empty, yes_odds in [0, 1].
    pub fn validate(&self) -> Result<(), String> {
        if self.slug.trim().is_empty() {
            return Err("market slug must not be empty".into());
        }
        if self.question.trim().is_empty() {
            return Err("market question must not be empty".into());
        }
        if !(0.0..=1.0).contains(&self.yes_odds) || !self.yes_odds.is_finite() {
            return Err(format!("yes_odds {} is not in [0, 1]", self.yes_odds));
        }
        Ok(())
    }
}

/// Deterministic slug for a result-directory name: first 50 chars of the
/// question, lowercased, non-alphanumerics collapsed to single dashes.
pub fn slugify_question(question: &str) -> String {
    let lowered = question.to_lowercase();
    let truncated: String = lowered.chars().take(50).collect();

    let mut slug = String::with_capacity(truncated.len());
    let mut last_was_dash = false;
    for ch in truncated.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    slug.trim_matches('-').to_string()
}
