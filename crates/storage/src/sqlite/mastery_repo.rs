use study_core::model::{MasteryState, UserId};

use super::{
    SqliteRepository,
    mapping::{map_mastery_row, user_id_to_i64},
};
use crate::repository::{MasteryStore, StorageError};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait::async_trait]
impl MasteryStore for SqliteRepository {
    async fn load_mastery(&self, user: UserId) -> Result<MasteryState, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                concept_id, mastery_score, attempt_count, correct_count,
                consecutive_correct, last_seen
            FROM mastery_records
            WHERE user_id = ?1
            ",
        )
        .bind(user_id_to_i64(user)?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut state = MasteryState::with_capacity(rows.len());
        for row in rows {
            let record = map_mastery_row(&row)?;
            state.insert(record.concept_id().clone(), record);
        }
        Ok(state)
    }

    async fn save_mastery(&self, user: UserId, state: &MasteryState) -> Result<(), StorageError> {
        let user_id = user_id_to_i64(user)?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query("DELETE FROM mastery_records WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for record in state.values() {
            sqlx::query(
                r"
                INSERT INTO mastery_records (
                    user_id, concept_id, mastery_score, attempt_count,
                    correct_count, consecutive_correct, last_seen
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )
            .bind(user_id)
            .bind(record.concept_id().as_str())
            .bind(record.mastery_score())
            .bind(i64::from(record.attempt_count()))
            .bind(i64::from(record.correct_count()))
            .bind(i64::from(record.consecutive_correct()))
            .bind(record.last_seen())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        tracing::debug!(user = user.value(), records = state.len(), "mastery saved");
        Ok(())
    }
}
