//! Report composer — assembles lab inputs and a resolved classification
//! into an immutable `Report`, and lays the report out as an ordered
//! section document for the export renderer.
//!
//! Composition never touches storage: the classification arrives already
//! resolved, with its own copy of the matched rule.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::egfr::EGFR_UNIT;
use crate::models::{ClassificationOutcome, LabInput, ResolvedClassification};

pub const REPORT_TITLE: &str = "eGFR Result Report";

/// Shown in place of every advice field when no rule matched.
pub const NO_MATCH_ADVICE: &str =
    "Consult a physician; no matching staging rule was found for this eGFR value.";

pub const DISCLAIMER: &str = "This calculation is based on the CKD-EPI equation and is for \
informational purposes only. Always consult with a healthcare professional for proper medical advice.";

/// Scores at or above this are drawn as within the expected range.
pub const NORMAL_FUNCTION_THRESHOLD: f64 = 60.0;

/// KDIGO stage descriptions printed as a reference table.
pub const CKD_STAGE_REFERENCE: [(u32, &str); 5] = [
    (1, "Normal or high eGFR (90 or above)"),
    (2, "Mildly decreased eGFR (60-89)"),
    (3, "Moderately decreased eGFR (30-59)"),
    (4, "Severely decreased eGFR (15-29)"),
    (5, "Kidney failure (eGFR below 15)"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub patient_inputs: LabInput,
    pub classification: ResolvedClassification,
    pub generated_at: DateTime<Utc>,
}

/// The three advice strings, verbatim from the matched rule or the fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendations {
    pub lifestyle: String,
    pub diet: String,
    pub medical: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionBand {
    Normal,
    Reduced,
}

pub fn compose(inputs: LabInput, classification: ResolvedClassification) -> Report {
    compose_at(inputs, classification, Utc::now())
}

pub fn compose_at(
    inputs: LabInput,
    classification: ResolvedClassification,
    generated_at: DateTime<Utc>,
) -> Report {
    Report {
        patient_inputs: inputs,
        classification,
        generated_at,
    }
}

impl Report {
    pub fn outcome(&self) -> ClassificationOutcome {
        self.classification.outcome
    }

    pub fn recommendations(&self) -> Recommendations {
        match &self.classification.matched_rule {
            Some(rule) => Recommendations {
                lifestyle: rule.lifestyle_advice.clone(),
                diet: rule.food_advice.clone(),
                medical: rule.medical_advice.clone(),
            },
            None => Recommendations {
                lifestyle: NO_MATCH_ADVICE.to_string(),
                diet: NO_MATCH_ADVICE.to_string(),
                medical: NO_MATCH_ADVICE.to_string(),
            },
        }
    }

    pub fn band(&self) -> FunctionBand {
        if self.classification.score.value >= NORMAL_FUNCTION_THRESHOLD {
            FunctionBand::Normal
        } else {
            FunctionBand::Reduced
        }
    }

    pub fn stage_label(&self) -> String {
        match self.classification.stage() {
            Some(stage) => format!("Stage {stage}"),
            None => "Unclassified".to_string(),
        }
    }

    /// Ordered section model. Contains no timestamps; the generation time is
    /// stamped separately by the renderer.
    pub fn document(&self) -> ReportDocument {
        let inputs = &self.patient_inputs;
        let score = &self.classification.score;

        let patient = Section::new("Patient Information")
            .entry("Age", format!("{}", inputs.age()))
            .entry("Gender", inputs.gender().label())
            .entry(
                "Serum Creatinine",
                format!("{} mg/dL", inputs.serum_creatinine()),
            );

        let band = match self.band() {
            FunctionBand::Normal => "Within expected range",
            FunctionBand::Reduced => "Reduced kidney function",
        };
        let mut result = Section::new("Result")
            .entry("eGFR", format!("{} {EGFR_UNIT}", score.display()))
            .entry("Stage", self.stage_label())
            .entry("Kidney function", band);
        match &self.classification.matched_rule {
            Some(rule) => {
                result = result.entry("Matched range", rule.range_label());
            }
            None => {
                result = result.entry("Outcome", self.outcome().describe());
            }
        }

        let recs = self.recommendations();
        let recommendations = Section::new("Recommendations")
            .entry("Lifestyle", recs.lifestyle)
            .entry("Diet", recs.diet)
            .entry("Medical", recs.medical);

        let mut reference = Section::new("CKD Stages Reference");
        for (stage, description) in CKD_STAGE_REFERENCE {
            reference = reference.entry(format!("Stage {stage}"), description);
        }

        let disclaimer = Section::new("Disclaimer").text(DISCLAIMER);

        ReportDocument {
            title: REPORT_TITLE.to_string(),
            sections: vec![patient, result, recommendations, reference, disclaimer],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportDocument {
    pub title: String,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub heading: String,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub label: Option<String>,
    pub text: String,
}

impl Section {
    fn new(heading: &str) -> Self {
        Self {
            heading: heading.to_string(),
            entries: Vec::new(),
        }
    }

    fn entry(mut self, label: impl Into<String>, text: impl Into<String>) -> Self {
        self.entries.push(Entry {
            label: Some(label.into()),
            text: text.into(),
        });
        self
    }

    fn text(mut self, text: impl Into<String>) -> Self {
        self.entries.push(Entry {
            label: None,
            text: text.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EgfrScore, Gender, StagingRule};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn inputs() -> LabInput {
        LabInput::new(50.0, 1.2, Gender::Male).unwrap()
    }

    fn matched(value: f64) -> ResolvedClassification {
        ResolvedClassification {
            score: EgfrScore {
                value,
                computed_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            },
            matched_rule: Some(StagingRule {
                id: Uuid::nil(),
                stage: 2,
                egfr_low: 60.0,
                egfr_high: 90.0,
                lifestyle_advice: "Marchez 30 minutes par jour".into(),
                food_advice: "Réduire le sel".into(),
                medical_advice: "Contrôle annuel".into(),
                revision: 1,
                updated_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            }),
            outcome: ClassificationOutcome::Matched,
        }
    }

    fn unmatched(value: f64, outcome: ClassificationOutcome) -> ResolvedClassification {
        ResolvedClassification {
            score: EgfrScore {
                value,
                computed_at: Utc::now(),
            },
            matched_rule: None,
            outcome,
        }
    }

    fn all_text(doc: &ReportDocument) -> String {
        doc.sections
            .iter()
            .flat_map(|s| s.entries.iter().map(|e| e.text.clone()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn compose_keeps_inputs_and_classification() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let report = compose_at(inputs(), matched(73.67), at);
        assert_eq!(report.generated_at, at);
        assert_eq!(report.patient_inputs, inputs());
        assert_eq!(report.outcome(), ClassificationOutcome::Matched);
        assert_eq!(report.stage_label(), "Stage 2");
    }

    #[test]
    fn matched_report_carries_advice_verbatim() {
        let report = compose(inputs(), matched(73.67));
        let recs = report.recommendations();
        assert_eq!(recs.diet, "Réduire le sel");

        let text = all_text(&report.document());
        assert!(text.contains("Marchez 30 minutes par jour"));
        assert!(text.contains("Réduire le sel"));
        assert!(text.contains("Contrôle annuel"));
        assert!(text.contains("73.67 mL/min/1.73m²"));
        assert!(text.contains("60.00 – 90.00"));
    }

    #[test]
    fn unmatched_report_uses_physician_fallback() {
        let report = compose(inputs(), unmatched(73.67, ClassificationOutcome::UnmatchedAbove));
        let recs = report.recommendations();
        assert_eq!(recs.lifestyle, NO_MATCH_ADVICE);
        assert_eq!(recs.medical, NO_MATCH_ADVICE);
        assert_eq!(report.stage_label(), "Unclassified");

        let text = all_text(&report.document());
        assert!(text.contains("above every configured staging range"));
        assert!(text.contains("Consult a physician"));
    }

    #[test]
    fn band_threshold_is_sixty() {
        let normal = compose(inputs(), matched(60.0));
        assert_eq!(normal.band(), FunctionBand::Normal);
        let reduced = compose(inputs(), unmatched(59.99, ClassificationOutcome::UnmatchedGap));
        assert_eq!(reduced.band(), FunctionBand::Reduced);
    }

    #[test]
    fn document_has_fixed_section_order() {
        let doc = compose(inputs(), matched(73.67)).document();
        let headings: Vec<&str> = doc.sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(
            headings,
            vec![
                "Patient Information",
                "Result",
                "Recommendations",
                "CKD Stages Reference",
                "Disclaimer"
            ]
        );
        assert_eq!(doc.title, REPORT_TITLE);
    }

    #[test]
    fn document_ignores_timestamps() {
        let a = compose_at(inputs(), matched(73.67), Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        let b = compose_at(inputs(), matched(73.67), Utc.with_ymd_and_hms(2027, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(a.document(), b.document());
    }
}
