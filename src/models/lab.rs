use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::Gender;
use super::validation::{ValidationError, Validator};

/// Accepted intake bounds (the portal form enforces the same limits).
pub const AGE_RANGE: (f64, f64) = (1.0, 120.0);
pub const SERUM_CREATININE_RANGE: (f64, f64) = (0.1, 20.0);

/// Lab values for one eGFR calculation. Construction guarantees both numbers
/// are finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LabInput {
    age: f64,
    serum_creatinine: f64,
    gender: Gender,
}

impl LabInput {
    pub fn new(age: f64, serum_creatinine: f64, gender: Gender) -> Result<Self, ValidationError> {
        let mut v = Validator::new();
        v.check(age.is_finite() && age > 0.0, "age", "must be a positive number");
        v.check(
            serum_creatinine.is_finite() && serum_creatinine > 0.0,
            "serum_creatinine",
            "must be a positive number",
        );
        v.finish()?;
        Ok(Self {
            age,
            serum_creatinine,
            gender,
        })
    }

    pub fn age(&self) -> f64 {
        self.age
    }

    /// Serum creatinine in mg/dL.
    pub fn serum_creatinine(&self) -> f64 {
        self.serum_creatinine
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }
}

/// A computed eGFR in mL/min/1.73m², already rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EgfrScore {
    pub value: f64,
    pub computed_at: DateTime<Utc>,
}

impl EgfrScore {
    /// Fixed two-decimal rendering used everywhere the score is displayed.
    pub fn display(&self) -> String {
        format!("{:.2}", self.value)
    }
}

/// Form values arrive either as JSON numbers or as the strings an HTML
/// number input submits.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FormNumber {
    Number(f64),
    Text(String),
}

impl FormNumber {
    fn parse(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

/// Raw eGFR request body as submitted by the portal.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabInputForm {
    #[serde(default)]
    pub age: Option<FormNumber>,
    #[serde(default)]
    pub serum_creatinine: Option<FormNumber>,
    #[serde(default)]
    pub gender: Option<String>,
}

impl LabInputForm {
    /// Required-field, numeric and range checks, then `LabInput` construction.
    pub fn into_lab_input(self) -> Result<LabInput, ValidationError> {
        let mut v = Validator::new();

        let age = bounded(&mut v, "age", self.age.as_ref(), AGE_RANGE);
        let scr = bounded(
            &mut v,
            "serum_creatinine",
            self.serum_creatinine.as_ref(),
            SERUM_CREATININE_RANGE,
        );

        let gender = match self.gender.as_deref().map(|g| g.trim().to_lowercase()) {
            None => {
                v.reject("gender", "is required");
                None
            }
            Some(g) => match g.parse::<Gender>() {
                Ok(gender) => Some(gender),
                Err(_) => {
                    v.reject("gender", "must be \"male\" or \"female\"");
                    None
                }
            },
        };

        v.finish()?;
        match (age, scr, gender) {
            (Some(age), Some(scr), Some(gender)) => LabInput::new(age, scr, gender),
            _ => Err(ValidationError::single("form", "incomplete lab input")),
        }
    }
}

fn bounded(
    v: &mut Validator,
    field: &str,
    raw: Option<&FormNumber>,
    (min, max): (f64, f64),
) -> Option<f64> {
    let Some(raw) = raw else {
        v.reject(field, "is required");
        return None;
    };
    match raw.parse() {
        Some(n) if n.is_finite() && (min..=max).contains(&n) => Some(n),
        Some(n) if n.is_finite() => {
            v.reject(field, format!("must be between {min} and {max}"));
            None
        }
        _ => {
            v.reject(field, "must be a number");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(age: &str, scr: &str, gender: &str) -> LabInputForm {
        LabInputForm {
            age: Some(FormNumber::Text(age.into())),
            serum_creatinine: Some(FormNumber::Text(scr.into())),
            gender: Some(gender.into()),
        }
    }

    #[test]
    fn new_rejects_non_positive_values() {
        let err = LabInput::new(0.0, -1.0, Gender::Male).unwrap_err();
        assert!(err.has_field("age"));
        assert!(err.has_field("serum_creatinine"));
        assert!(LabInput::new(f64::NAN, 1.0, Gender::Female).is_err());
    }

    #[test]
    fn form_accepts_strings_and_numbers() {
        let input = form("50", " 1.2 ", "Male").into_lab_input().unwrap();
        assert_eq!(input.age(), 50.0);
        assert_eq!(input.serum_creatinine(), 1.2);
        assert_eq!(input.gender(), Gender::Male);

        let json = r#"{"age": 61, "serum_creatinine": 0.9, "gender": "female"}"#;
        let parsed: LabInputForm = serde_json::from_str(json).unwrap();
        let input = parsed.into_lab_input().unwrap();
        assert_eq!(input.gender(), Gender::Female);
    }

    #[test]
    fn form_reports_missing_fields() {
        let err = LabInputForm::default().into_lab_input().unwrap_err();
        assert_eq!(err.fields.len(), 3);
    }

    #[test]
    fn form_rejects_out_of_range_and_unknown_gender() {
        let err = form("130", "abc", "x").into_lab_input().unwrap_err();
        assert!(err.has_field("age"));
        assert!(err.has_field("serum_creatinine"));
        assert!(err.has_field("gender"));
    }

    #[test]
    fn score_display_is_two_decimals() {
        let score = EgfrScore {
            value: 73.6,
            computed_at: Utc::now(),
        };
        assert_eq!(score.display(), "73.60");
    }
}
