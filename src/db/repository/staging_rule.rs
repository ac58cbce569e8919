use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::StagingRule;

const RULE_COLUMNS: &str = "id, stage, egfr_low, egfr_high, lifestyle_advice, food_advice,
     medical_advice, revision, updated_at";

/// Insert or replace a rule by id.
pub fn upsert_staging_rule(conn: &Connection, rule: &StagingRule) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO staging_rules (id, stage, egfr_low, egfr_high, lifestyle_advice,
         food_advice, medical_advice, revision, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(id) DO UPDATE SET
            stage = excluded.stage,
            egfr_low = excluded.egfr_low,
            egfr_high = excluded.egfr_high,
            lifestyle_advice = excluded.lifestyle_advice,
            food_advice = excluded.food_advice,
            medical_advice = excluded.medical_advice,
            revision = excluded.revision,
            updated_at = excluded.updated_at",
        params![
            rule.id.to_string(),
            rule.stage,
            rule.egfr_low,
            rule.egfr_high,
            rule.lifestyle_advice,
            rule.food_advice,
            rule.medical_advice,
            rule.revision,
            rule.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// All rules, ordered by lower bound then upper bound, stage and id.
pub fn list_staging_rules(conn: &Connection) -> Result<Vec<StagingRule>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RULE_COLUMNS} FROM staging_rules
         ORDER BY egfr_low ASC, egfr_high ASC, stage ASC, id ASC"
    ))?;

    let rows = stmt.query_map([], |row| Ok(rule_row_from_rusqlite(row)))?;

    let mut rules = Vec::new();
    for row in rows {
        rules.push(rule_from_row(row??)?);
    }
    Ok(rules)
}

pub fn delete_staging_rule(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM staging_rules WHERE id = ?1",
        params![id.to_string()],
    )?;
    if deleted == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "StagingRule".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Next value of the store-wide write sequence.
pub fn next_rule_revision(conn: &Connection) -> Result<i64, DatabaseError> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(revision) FROM staging_rules",
        [],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0) + 1)
}

// Internal row type for StagingRule mapping
struct RuleRow {
    id: String,
    stage: i64,
    egfr_low: f64,
    egfr_high: f64,
    lifestyle_advice: String,
    food_advice: String,
    medical_advice: String,
    revision: i64,
    updated_at: String,
}

fn rule_row_from_rusqlite(row: &Row<'_>) -> Result<RuleRow, rusqlite::Error> {
    Ok(RuleRow {
        id: row.get(0)?,
        stage: row.get(1)?,
        egfr_low: row.get(2)?,
        egfr_high: row.get(3)?,
        lifestyle_advice: row.get(4)?,
        food_advice: row.get(5)?,
        medical_advice: row.get(6)?,
        revision: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn rule_from_row(row: RuleRow) -> Result<StagingRule, DatabaseError> {
    let id = Uuid::parse_str(&row.id)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("Invalid rule id {}: {e}", row.id)))?;
    let stage = u32::try_from(row.stage)
        .map_err(|_| DatabaseError::ConstraintViolation(format!("Invalid stage {}", row.stage)))?;
    let updated_at = DateTime::parse_from_rfc3339(&row.updated_at)
        .map_err(|e| {
            DatabaseError::ConstraintViolation(format!("Invalid updated_at {}: {e}", row.updated_at))
        })?
        .with_timezone(&Utc);

    Ok(StagingRule {
        id,
        stage,
        egfr_low: row.egfr_low,
        egfr_high: row.egfr_high,
        lifestyle_advice: row.lifestyle_advice,
        food_advice: row.food_advice,
        medical_advice: row.medical_advice,
        revision: row.revision,
        updated_at,
    })
}
