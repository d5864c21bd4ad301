//! Counter folding and the presentation-only figures derived from a [`StatsSnapshot`].

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{Bias, ClassificationResult, DiversitySnapshot, Sentiment, StatsSnapshot, Toxicity};

/// Posts required before any qualitative claim is made.
pub const MIN_ASSESSMENT_SAMPLE: u64 = 5;

pub const ANALYZING_MESSAGE: &str = "Analyzing... need more posts for accurate assessment.";

impl StatsSnapshot {
    /// Increment one bucket per field and re-derive `total` from the bias buckets.
    pub fn apply(&mut self, result: &ClassificationResult, now: DateTime<Utc>) {
        match result.bias {
            Bias::Left => self.left += 1,
            Bias::Center => self.center += 1,
            Bias::Right => self.right += 1,
        }
        match result.sentiment {
            Sentiment::Positive => self.positive += 1,
            Sentiment::Neutral => self.neutral += 1,
            Sentiment::Negative => self.negative += 1,
        }
        match result.toxicity {
            Toxicity::Low => self.toxic_low += 1,
            Toxicity::Medium => self.toxic_medium += 1,
            Toxicity::High => self.toxic_high += 1,
        }
        self.total = self.left + self.center + self.right;
        self.last_updated = Some(now);
    }

    fn share(&self, count: u64) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64 * 100.0
        }
    }

    pub fn left_pct(&self) -> f64 {
        self.share(self.left)
    }

    pub fn center_pct(&self) -> f64 {
        self.share(self.center)
    }

    pub fn right_pct(&self) -> f64 {
        self.share(self.right)
    }

    /// Signed lean in [-100, 100]; positive leans right.
    pub fn balance_score(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.right as f64 - self.left as f64) / self.total as f64 * 100.0
    }

    /// Position of the meter needle on a 0-100 scale, 50 being centered.
    pub fn meter_position(&self) -> f64 {
        50.0 + self.balance_score() / 2.0
    }

    pub fn assessment(&self) -> String {
        if self.total < MIN_ASSESSMENT_SAMPLE {
            return ANALYZING_MESSAGE.to_string();
        }

        let left_pct = self.left_pct();
        let center_pct = self.center_pct();
        let right_pct = self.right_pct();
        let negative_pct = self.share(self.negative);
        let toxic_high_pct = self.share(self.toxic_high);

        let mut assessment = if (left_pct - right_pct).abs() < 15.0 && center_pct > 20.0 {
            "Balanced perspectives"
        } else if left_pct > 60.0 {
            "Strongly left-leaning"
        } else if right_pct > 60.0 {
            "Strongly right-leaning"
        } else if left_pct > 45.0 {
            "Moderately left"
        } else if right_pct > 45.0 {
            "Moderately right"
        } else {
            "Moderate balance"
        }
        .to_string();

        if negative_pct > 60.0 {
            assessment.push_str(" | High negativity");
        }

        if toxic_high_pct > 20.0 {
            assessment.push_str(" | Toxic content detected");
        } else if toxic_high_pct < 5.0 && self.total > 20 {
            assessment.push_str(" | Clean discourse");
        }

        assessment
    }
}

/// Everything a display surface needs, computed in one place.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub stats: StatsSnapshot,
    pub left_pct: f64,
    pub center_pct: f64,
    pub right_pct: f64,
    pub meter_position: f64,
    pub assessment: String,
    pub unique_authors: usize,
    pub original: u64,
    pub retweets: u64,
}

impl StatsReport {
    pub fn new(stats: StatsSnapshot, diversity: &DiversitySnapshot) -> Self {
        Self {
            left_pct: stats.left_pct(),
            center_pct: stats.center_pct(),
            right_pct: stats.right_pct(),
            meter_position: stats.meter_position(),
            assessment: stats.assessment(),
            unique_authors: diversity.authors.len(),
            original: diversity.original,
            retweets: diversity.retweet,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(left: u64, center: u64, right: u64) -> StatsSnapshot {
        StatsSnapshot {
            left,
            center,
            right,
            total: left + center + right,
            neutral: left + center + right,
            toxic_low: left + center + right,
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_keeps_total_in_sync() {
        let mut stats = StatsSnapshot::default();
        let results = [
            ClassificationResult::new(Bias::Left, Sentiment::Negative, Toxicity::High),
            ClassificationResult::new(Bias::Center, Sentiment::Neutral, Toxicity::Low),
            ClassificationResult::new(Bias::Right, Sentiment::Positive, Toxicity::Medium),
            ClassificationResult::new(Bias::Left, Sentiment::Neutral, Toxicity::Low),
        ];

        for result in &results {
            stats.apply(result, Utc::now());
            assert_eq!(stats.total, stats.left + stats.center + stats.right);
        }

        assert_eq!(stats.left, 2);
        assert_eq!(stats.toxic_high, 1);
        assert_eq!(stats.toxic_medium, 1);
        assert_eq!(stats.neutral, 2);
        assert!(stats.last_updated.is_some());
    }

    #[test]
    fn test_percentages_and_meter() {
        let stats = snapshot(1, 2, 1);
        assert_eq!(stats.left_pct(), 25.0);
        assert_eq!(stats.center_pct(), 50.0);
        assert_eq!(stats.meter_position(), 50.0);

        let stats = snapshot(0, 0, 4);
        assert_eq!(stats.balance_score(), 100.0);
        assert_eq!(stats.meter_position(), 100.0);

        let empty = StatsSnapshot::default();
        assert_eq!(empty.left_pct(), 0.0);
        assert_eq!(empty.meter_position(), 50.0);
    }

    #[test]
    fn test_assessment_needs_minimum_sample() {
        assert_eq!(snapshot(4, 0, 0).assessment(), ANALYZING_MESSAGE);
    }

    #[test]
    fn test_assessment_strongly_left() {
        let stats = snapshot(14, 3, 3);
        assert!(stats.assessment().contains("Strongly left-leaning"));
    }

    #[test]
    fn test_assessment_rules() {
        assert!(snapshot(3, 4, 3).assessment().starts_with("Balanced perspectives"));
        assert!(snapshot(1, 1, 8).assessment().starts_with("Strongly right-leaning"));
        assert!(snapshot(5, 1, 4).assessment().starts_with("Moderately left"));
        assert!(snapshot(4, 1, 5).assessment().starts_with("Moderately right"));
        assert!(snapshot(4, 2, 4).assessment().starts_with("Moderate balance"));
    }

    #[test]
    fn test_assessment_secondary_clauses() {
        let mut stats = snapshot(3, 4, 3);
        stats.negative = 7;
        stats.toxic_high = 3;
        let assessment = stats.assessment();
        assert!(assessment.contains("High negativity"));
        assert!(assessment.contains("Toxic content detected"));

        let clean = snapshot(7, 8, 7);
        assert!(clean.assessment().ends_with("Clean discourse"));

        // Not enough posts for the clean-discourse clause.
        let small = snapshot(3, 4, 3);
        assert!(!small.assessment().contains("Clean discourse"));
    }

    #[test]
    fn test_report_carries_diversity() {
        let mut diversity = DiversitySnapshot::default();
        diversity.authors.insert("alice".to_string());
        diversity.authors.insert("bob".to_string());
        diversity.original = 3;
        diversity.retweet = 1;

        let report = StatsReport::new(snapshot(2, 1, 1), &diversity);
        assert_eq!(report.unique_authors, 2);
        assert_eq!(report.retweets, 1);
        assert_eq!(report.left_pct, 50.0);
    }
}
