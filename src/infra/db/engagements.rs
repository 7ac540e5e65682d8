use std::convert::TryFrom;

use async_trait::async_trait;
use sqlx::types::Json;
use time::OffsetDateTime;

use crate::{
    application::repos::{EngagementStore, PersistError},
    domain::entities::{EngagementRecord, PostId, ShareInfo},
};

use super::{PostgresEngagementStore, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct EngagementRow {
    id: String,
    total_reach: i64,
    share_details: Json<Vec<ShareInfo>>,
    computed_at: OffsetDateTime,
}

impl TryFrom<EngagementRow> for EngagementRecord {
    type Error = PersistError;

    fn try_from(row: EngagementRow) -> Result<Self, Self::Error> {
        let total_reach = u64::try_from(row.total_reach).map_err(|_| {
            PersistError::integrity(format!(
                "negative total_reach {} stored for post `{}`",
                row.total_reach, row.id
            ))
        })?;

        Ok(Self {
            id: PostId::new(row.id),
            total_reach,
            share_details: row.share_details.0,
            computed_at: row.computed_at,
        })
    }
}

#[async_trait]
impl EngagementStore for PostgresEngagementStore {
    async fn read(&self, id: &PostId) -> Result<Option<EngagementRecord>, PersistError> {
        let row = sqlx::query_as::<_, EngagementRow>(
            r#"
            SELECT id, total_reach, share_details, computed_at
            FROM engagements
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(EngagementRecord::try_from).transpose()
    }

    async fn write(
        &self,
        id: &PostId,
        total_reach: u64,
        share_details: Vec<ShareInfo>,
    ) -> Result<EngagementRecord, PersistError> {
        let total_reach = i64::try_from(total_reach).map_err(|_| {
            PersistError::integrity(format!(
                "total_reach {total_reach} exceeds the storable range"
            ))
        })?;

        // A single upsert: readers see either the old row or the new one.
        let row = sqlx::query_as::<_, EngagementRow>(
            r#"
            INSERT INTO engagements (id, total_reach, share_details, computed_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                total_reach = EXCLUDED.total_reach,
                share_details = EXCLUDED.share_details,
                computed_at = EXCLUDED.computed_at
            RETURNING id, total_reach, share_details, computed_at
            "#,
        )
        .bind(id.as_str())
        .bind(total_reach)
        .bind(Json(&share_details))
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        EngagementRecord::try_from(row)
    }

    async fn health_check(&self) -> Result<(), PersistError> {
        self.ping().await.map_err(map_sqlx_error)
    }
}
