use sqlx::Row;

use story_core::model::{ScenarioId, StepId, TrainingRecord};
use story_core::scoring::{AssistanceLevel, Milestone};

use crate::repository::{StepRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Step levels are stored as a compact code string, one `F`/`P`/`I`
/// character per completed step in step order.
pub(crate) fn encode_levels(levels: &[AssistanceLevel]) -> String {
    levels.iter().map(|l| l.code()).collect()
}

pub(crate) fn decode_levels(encoded: &str) -> Result<Vec<AssistanceLevel>, StorageError> {
    encoded
        .chars()
        .map(|c| {
            AssistanceLevel::from_code(c)
                .ok_or_else(|| StorageError::Serialization(format!("invalid level code: {c}")))
        })
        .collect()
}

pub(crate) fn parse_level(s: &str) -> Result<AssistanceLevel, StorageError> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => AssistanceLevel::from_code(c)
            .ok_or_else(|| StorageError::Serialization(format!("invalid level: {s}"))),
        _ => Err(StorageError::Serialization(format!("invalid level: {s}"))),
    }
}

pub(crate) fn parse_milestone(s: &str) -> Result<Milestone, StorageError> {
    match s {
        "level1" => Ok(Milestone::Level1),
        "level2" => Ok(Milestone::Level2),
        _ => Err(StorageError::Serialization(format!("invalid milestone: {s}"))),
    }
}

pub(crate) fn step_id_from_i64(v: i64) -> Result<StepId, StorageError> {
    let id = u32::try_from(v)
        .map_err(|_| StorageError::Serialization(format!("invalid step id: {v}")))?;
    Ok(StepId::new(id))
}

pub(crate) fn map_step_row(row: &sqlx::sqlite::SqliteRow) -> Result<StepRecord, StorageError> {
    let id = step_id_from_i64(row.try_get("id").map_err(ser)?)?;
    let order_i64: i64 = row.try_get("order_index").map_err(ser)?;
    let order_index = u32::try_from(order_i64)
        .map_err(|_| StorageError::Serialization(format!("invalid order_index: {order_i64}")))?;
    Ok(StepRecord {
        id,
        order_index,
        instruction: row.try_get("instruction").map_err(ser)?,
        image_prompt: row.try_get("image_prompt").map_err(ser)?,
        image_url: row.try_get("image_url").map_err(ser)?,
    })
}

pub(crate) fn map_record_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<TrainingRecord, StorageError> {
    let timestamp: chrono::DateTime<chrono::Utc> = row.try_get("timestamp").map_err(ser)?;
    let scenario_id: String = row.try_get("scenario_id").map_err(ser)?;
    let scenario_name: String = row.try_get("scenario_name").map_err(ser)?;
    let step_levels = decode_levels(&row.try_get::<String, _>("step_levels").map_err(ser)?)?;
    let overall = parse_level(&row.try_get::<String, _>("overall_level").map_err(ser)?)?;
    let milestone = parse_milestone(&row.try_get::<String, _>("milestone").map_err(ser)?)?;

    let total_i64: i64 = row.try_get("total_steps").map_err(ser)?;
    let total_steps = u32::try_from(total_i64)
        .map_err(|_| StorageError::Serialization(format!("invalid total_steps: {total_i64}")))?;
    let completed_i64: i64 = row.try_get("completed_steps").map_err(ser)?;
    let completed_steps = u32::try_from(completed_i64).map_err(|_| {
        StorageError::Serialization(format!("invalid completed_steps: {completed_i64}"))
    })?;

    TrainingRecord::from_persisted(
        timestamp,
        ScenarioId::new(scenario_id),
        scenario_name,
        step_levels,
        overall,
        milestone,
        total_steps,
        completed_steps,
    )
    .map_err(ser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_string_round_trips() {
        use AssistanceLevel::{Full, Independent, Partial};
        let levels = vec![Full, Partial, Independent];
        let encoded = encode_levels(&levels);
        assert_eq!(encoded, "FPI");
        assert_eq!(decode_levels(&encoded).unwrap(), levels);
        assert!(decode_levels("FXI").is_err());
    }
}
