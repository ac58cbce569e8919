use serde::{Deserialize, Serialize};

use super::enums::ClassificationOutcome;
use super::lab::EgfrScore;
use super::staging_rule::StagingRule;

/// Result of resolving one score against one rule snapshot. `matched_rule`
/// is a copy, so later edits to the table never alter it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedClassification {
    pub score: EgfrScore,
    pub matched_rule: Option<StagingRule>,
    pub outcome: ClassificationOutcome,
}

impl ResolvedClassification {
    pub fn stage(&self) -> Option<u32> {
        self.matched_rule.as_ref().map(|r| r.stage)
    }
}
