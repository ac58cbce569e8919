//! Range Table Store — administrator-maintained eGFR staging rules.
//!
//! Writers are serialized and publish a new immutable `RuleSnapshot` only
//! after the write is durable. Readers clone the published `Arc` and never
//! observe a half-applied rule. Overlapping or gapped ranges are accepted
//! here; the resolution engine decides what they mean.

mod memory;
mod sqlite;

pub use memory::MemoryRangeTable;
pub use sqlite::SqliteRangeTable;

use std::ops::Deref;
use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{RuleDraft, StagingRule, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Staging rule not found: {0}")]
    NotFound(Uuid),
    #[error("Range table unavailable: {0}")]
    Unavailable(String),
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Immutable, fully materialised copy of the rule table, ordered by
/// `egfr_low` ascending (ties: `egfr_high`, `stage`, `id`).
#[derive(Debug, Clone)]
pub struct RuleSnapshot {
    rules: Arc<[StagingRule]>,
}

impl RuleSnapshot {
    pub fn new(mut rules: Vec<StagingRule>) -> Self {
        rules.sort_by(|a, b| {
            a.egfr_low
                .total_cmp(&b.egfr_low)
                .then(a.egfr_high.total_cmp(&b.egfr_high))
                .then(a.stage.cmp(&b.stage))
                .then(a.id.cmp(&b.id))
        });
        Self {
            rules: Arc::from(rules),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn rules(&self) -> &[StagingRule] {
        &self.rules
    }

    pub fn find(&self, id: &Uuid) -> Option<&StagingRule> {
        self.rules.iter().find(|r| &r.id == id)
    }

    /// Admin search: optional stage filter plus case-insensitive text match
    /// over the three advice fields.
    pub fn search(&self, query: &RuleQuery) -> Vec<StagingRule> {
        let needle = query
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        self.rules
            .iter()
            .filter(|r| query.stage.map_or(true, |s| r.stage == s))
            .filter(|r| match &needle {
                None => true,
                Some(n) => [&r.lifestyle_advice, &r.food_advice, &r.medical_advice]
                    .iter()
                    .any(|text| text.to_lowercase().contains(n.as_str())),
            })
            .cloned()
            .collect()
    }
}

impl Deref for RuleSnapshot {
    type Target = [StagingRule];

    fn deref(&self) -> &Self::Target {
        &self.rules
    }
}

/// Query parameters of the admin rule listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleQuery {
    pub stage: Option<u32>,
    pub q: Option<String>,
}

/// Storage contract for staging rules.
pub trait RangeTableStore: Send + Sync {
    /// Current published snapshot.
    fn list(&self) -> Result<RuleSnapshot, StoreError>;

    /// Validate and create or replace a rule. A rejected draft leaves the
    /// table untouched.
    fn upsert(&self, draft: RuleDraft) -> Result<StagingRule, StoreError>;

    fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    fn get(&self, id: Uuid) -> Result<StagingRule, StoreError> {
        self.list()?
            .find(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }
}

/// Standard KDIGO staging used to seed an empty table. Stage 1 has no
/// upper bound clinically; 10000 stands in for it.
pub fn default_staging_rules() -> Vec<RuleDraft> {
    let rule = |stage: i64, low: f64, high: f64, lifestyle: &str, food: &str, medical: &str| RuleDraft {
        id: None,
        stage,
        egfr_low: low,
        egfr_high: high,
        lifestyle_advice: lifestyle.into(),
        food_advice: food.into(),
        medical_advice: medical.into(),
    };

    vec![
        rule(
            1,
            90.0,
            10000.0,
            "Stay physically active, keep a healthy weight and avoid smoking.",
            "Eat a balanced diet and keep salt intake moderate.",
            "Check blood pressure and kidney function once a year.",
        ),
        rule(
            2,
            60.0,
            90.0,
            "Exercise regularly and limit alcohol.",
            "Reduce salt and processed food; stay well hydrated.",
            "Monitor blood pressure and blood sugar; repeat kidney tests yearly.",
        ),
        rule(
            3,
            30.0,
            60.0,
            "Keep active within your limits and avoid over-the-counter anti-inflammatory drugs.",
            "Limit salt, potassium and phosphorus as advised; moderate protein.",
            "See a nephrologist; review medications and test kidney function every 3-6 months.",
        ),
        rule(
            4,
            15.0,
            30.0,
            "Plan rest and activity with your care team.",
            "Follow a renal diet with restricted potassium, phosphorus and fluids.",
            "Prepare with your nephrologist for dialysis or transplant options.",
        ),
        rule(
            5,
            0.0,
            15.0,
            "Follow your treatment plan closely and report new symptoms promptly.",
            "Follow the dialysis diet prescribed by your dietitian.",
            "Kidney failure: dialysis or transplant evaluation is required.",
        ),
    ]
}

/// Seed the default rules when the table is empty. Returns the number of
/// rules written.
pub fn seed_defaults_if_empty(store: &dyn RangeTableStore) -> Result<usize, StoreError> {
    if !store.list()?.is_empty() {
        return Ok(0);
    }
    let defaults = default_staging_rules();
    let count = defaults.len();
    for draft in defaults {
        store.upsert(draft)?;
    }
    tracing::info!(count, "Seeded default staging rules");
    Ok(count)
}
