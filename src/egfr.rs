//! eGFR calculator — 2021 CKD-EPI creatinine equation (race-free).
//!
//! `eGFR = 142 × min(Scr/κ, 1)^α × max(Scr/κ, 1)^-1.200 × 0.9938^age × sex factor`
//!
//! Results are rounded to two decimals so display and export are identical
//! across platforms. Clinical bounds on the inputs are checked by the intake
//! layer (`LabInputForm`), not here.

use chrono::{DateTime, Utc};

use crate::models::{EgfrScore, Gender, LabInput};

const MULTIPLIER: f64 = 142.0;
const HIGH_EXPONENT: f64 = -1.200;
const AGE_BASE: f64 = 0.9938;

/// Unit of every computed score.
pub const EGFR_UNIT: &str = "mL/min/1.73m²";

/// Sex-specific equation constants.
struct Coefficients {
    kappa: f64,
    alpha: f64,
    sex_factor: f64,
}

fn coefficients(gender: Gender) -> Coefficients {
    match gender {
        Gender::Female => Coefficients {
            kappa: 0.7,
            alpha: -0.241,
            sex_factor: 1.012,
        },
        Gender::Male => Coefficients {
            kappa: 0.9,
            alpha: -0.302,
            sex_factor: 1.0,
        },
    }
}

/// Compute the score, stamped with the current time.
pub fn compute(input: &LabInput) -> EgfrScore {
    compute_at(input, Utc::now())
}

/// Compute the score with an explicit timestamp.
pub fn compute_at(input: &LabInput, computed_at: DateTime<Utc>) -> EgfrScore {
    let value = round2(raw_egfr(input));
    tracing::debug!(egfr = value, gender = %input.gender(), "eGFR computed");
    EgfrScore { value, computed_at }
}

fn raw_egfr(input: &LabInput) -> f64 {
    let c = coefficients(input.gender());
    let ratio = input.serum_creatinine() / c.kappa;

    MULTIPLIER
        * ratio.min(1.0).powf(c.alpha)
        * ratio.max(1.0).powf(HIGH_EXPONENT)
        * AGE_BASE.powf(input.age())
        * c.sex_factor
}

/// Round half away from zero to two decimals.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(age: f64, scr: f64, gender: Gender) -> LabInput {
        LabInput::new(age, scr, gender).unwrap()
    }

    #[test]
    fn reference_male_case() {
        let score = compute(&input(50.0, 1.2, Gender::Male));
        assert!((score.value - 73.67).abs() < 0.01, "got {}", score.value);
    }

    #[test]
    fn reference_female_case() {
        let score = compute(&input(50.0, 1.2, Gender::Female));
        assert!((score.value - 55.15).abs() < 0.01, "got {}", score.value);
    }

    #[test]
    fn low_creatinine_uses_alpha_branch() {
        let female = compute(&input(30.0, 0.6, Gender::Female));
        assert!((female.value - 123.76).abs() < 0.01, "got {}", female.value);
        let male = compute(&input(30.0, 0.6, Gender::Male));
        assert!((male.value - 133.18).abs() < 0.01, "got {}", male.value);
    }

    #[test]
    fn kidney_failure_range() {
        let score = compute(&input(70.0, 5.0, Gender::Male));
        assert!(score.value < 15.0);
        assert!((score.value - 11.74).abs() < 0.01, "got {}", score.value);
    }

    #[test]
    fn deterministic_for_equal_inputs() {
        let at = Utc::now();
        let a = compute_at(&input(64.0, 1.37, Gender::Female), at);
        let b = compute_at(&input(64.0, 1.37, Gender::Female), at);
        assert_eq!(a, b);
        assert_eq!(a.display(), b.display());
    }

    #[test]
    fn values_have_at_most_two_decimals() {
        for scr in [0.3, 0.71, 0.9, 1.05, 2.4, 7.7] {
            let score = compute(&input(45.0, scr, Gender::Male));
            let scaled = score.value * 100.0;
            assert!((scaled - scaled.round()).abs() < 1e-6);
        }
    }

    #[test]
    fn older_age_lowers_score() {
        let young = compute(&input(30.0, 1.0, Gender::Male));
        let old = compute(&input(80.0, 1.0, Gender::Male));
        assert!(old.value < young.value);
    }

    #[test]
    fn round2_behaviour() {
        assert_eq!(round2(73.673530), 73.67);
        assert_eq!(round2(10.005000001), 10.01);
        assert_eq!(round2(12.0), 12.0);
    }
}
