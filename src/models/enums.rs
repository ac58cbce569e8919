use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Gender {
    Male => "male",
    Female => "female",
});

str_enum!(ClassificationOutcome {
    Matched => "matched",
    UnmatchedBelow => "unmatched_below",
    UnmatchedAbove => "unmatched_above",
    UnmatchedGap => "unmatched_gap",
});

str_enum!(ArtifactFormat {
    Pdf => "pdf",
    Text => "text",
});

str_enum!(Role {
    Admin => "admin",
    Client => "client",
});

impl Gender {
    /// Capitalised label used in rendered reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }
}

impl ClassificationOutcome {
    /// Human-readable explanation of an unmatched outcome.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Matched => "Matched a staging rule",
            Self::UnmatchedBelow => "eGFR is below every configured staging range",
            Self::UnmatchedAbove => "eGFR is above every configured staging range",
            Self::UnmatchedGap => "eGFR falls outside the configured staging ranges",
        }
    }
}

impl ArtifactFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Text => "text/plain; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "txt",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn gender_round_trip() {
        for (variant, s) in [(Gender::Male, "male"), (Gender::Female, "female")] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(Gender::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn outcome_round_trip() {
        for (variant, s) in [
            (ClassificationOutcome::Matched, "matched"),
            (ClassificationOutcome::UnmatchedBelow, "unmatched_below"),
            (ClassificationOutcome::UnmatchedAbove, "unmatched_above"),
            (ClassificationOutcome::UnmatchedGap, "unmatched_gap"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(ClassificationOutcome::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn outcome_serializes_snake_case() {
        let json = serde_json::to_string(&ClassificationOutcome::UnmatchedAbove).unwrap();
        assert_eq!(json, "\"unmatched_above\"");
    }

    #[test]
    fn invalid_value_is_rejected() {
        let err = Gender::from_str("other").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn artifact_format_metadata() {
        assert_eq!(ArtifactFormat::Pdf.content_type(), "application/pdf");
        assert_eq!(ArtifactFormat::Text.extension(), "txt");
    }
}
