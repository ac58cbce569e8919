use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::validation::{ValidationError, Validator};

/// An administrator-authored mapping from an eGFR interval to a CKD stage
/// and the advice shown for it. The interval is `[egfr_low, egfr_high)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingRule {
    pub id: Uuid,
    pub stage: u32,
    pub egfr_low: f64,
    pub egfr_high: f64,
    pub lifestyle_advice: String,
    pub food_advice: String,
    pub medical_advice: String,
    /// Store-wide write sequence; larger means more recently written.
    pub revision: i64,
    pub updated_at: DateTime<Utc>,
}

impl StagingRule {
    /// Low bound inclusive, high bound exclusive.
    pub fn contains(&self, score: f64) -> bool {
        self.egfr_low <= score && score < self.egfr_high
    }

    pub fn overlaps(&self, other: &StagingRule) -> bool {
        self.egfr_low < other.egfr_high && other.egfr_low < self.egfr_high
    }

    /// Display form of the interval, e.g. `60.00 – 90.00`.
    pub fn range_label(&self) -> String {
        format!("{:.2} – {:.2}", self.egfr_low, self.egfr_high)
    }
}

/// Write payload for creating or replacing a rule. Absent `id` means create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDraft {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub stage: i64,
    pub egfr_low: f64,
    pub egfr_high: f64,
    pub lifestyle_advice: String,
    pub food_advice: String,
    pub medical_advice: String,
}

impl RuleDraft {
    /// Structural checks applied before any write reaches storage.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut v = Validator::new();

        v.check(self.stage >= 1, "stage", "must be an integer of at least 1");
        if self.stage > i64::from(u32::MAX) {
            v.reject("stage", "is out of range");
        }

        for (field, bound) in [("egfr_low", self.egfr_low), ("egfr_high", self.egfr_high)] {
            if !bound.is_finite() {
                v.reject(field, "must be a finite number");
            } else if bound < 0.0 {
                v.reject(field, "must not be negative");
            }
        }
        if self.egfr_low.is_finite()
            && self.egfr_high.is_finite()
            && self.egfr_low >= self.egfr_high
        {
            v.reject("egfr_high", "must be greater than egfr_low");
        }

        for (field, text) in [
            ("lifestyle_advice", &self.lifestyle_advice),
            ("food_advice", &self.food_advice),
            ("medical_advice", &self.medical_advice),
        ] {
            v.check(!text.trim().is_empty(), field, "must not be empty");
        }

        v.finish()
    }

    /// Materialise a validated draft into a stored rule.
    pub(crate) fn into_rule(self, id: Uuid, revision: i64, updated_at: DateTime<Utc>) -> StagingRule {
        StagingRule {
            id,
            stage: u32::try_from(self.stage).unwrap_or(u32::MAX),
            egfr_low: self.egfr_low,
            egfr_high: self.egfr_high,
            lifestyle_advice: self.lifestyle_advice,
            food_advice: self.food_advice,
            medical_advice: self.medical_advice,
            revision,
            updated_at,
        }
    }
}
