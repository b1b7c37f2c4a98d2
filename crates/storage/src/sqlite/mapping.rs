use sqlx::Row;
use study_core::model::{ConceptId, MasteryRecord, UserId};

use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn user_id_to_i64(user: UserId) -> Result<i64, StorageError> {
    i64::try_from(user.value()).map_err(|_| StorageError::Serialization("user_id overflow".into()))
}

pub(crate) fn map_mastery_row(row: &sqlx::sqlite::SqliteRow) -> Result<MasteryRecord, StorageError> {
    let concept_id = ConceptId::new(row.try_get::<String, _>("concept_id").map_err(ser)?)
        .map_err(|e| StorageError::InvalidData(e.to_string()))?;

    MasteryRecord::from_persisted(
        concept_id,
        row.try_get("mastery_score").map_err(ser)?,
        u32_from_i64(
            "attempt_count",
            row.try_get::<i64, _>("attempt_count").map_err(ser)?,
        )?,
        u32_from_i64(
            "correct_count",
            row.try_get::<i64, _>("correct_count").map_err(ser)?,
        )?,
        u32_from_i64(
            "consecutive_correct",
            row.try_get::<i64, _>("consecutive_correct").map_err(ser)?,
        )?,
        row.try_get("last_seen").map_err(ser)?,
    )
    .map_err(|e| StorageError::InvalidData(e.to_string()))
}
