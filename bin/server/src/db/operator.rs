//! PostgreSQL-backed operator directory.

use async_trait::async_trait;
use relaydesk_core::{AreaId, OperatorId};
use relaydesk_operators::{Area, DirectoryError, Operator, OperatorDirectory};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::info;

fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        message,
    )))
}

fn lookup_failed(e: sqlx::Error) -> DirectoryError {
    DirectoryError::LookupFailed {
        reason: e.to_string(),
    }
}

/// Row type for area queries.
#[derive(FromRow)]
struct AreaRow {
    id: String,
    name: String,
}

impl AreaRow {
    fn try_into_area(self) -> Result<Area, sqlx::Error> {
        let id = AreaId::from_str(&self.id)
            .map_err(|e| decode_error(format!("invalid area id '{}': {e}", self.id)))?;
        Ok(Area {
            id,
            name: self.name,
        })
    }
}

/// Row type for operator queries.
#[derive(FromRow)]
struct OperatorRow {
    id: String,
    display_name: String,
    area_id: String,
    phone: String,
    available: bool,
}

impl OperatorRow {
    fn try_into_operator(self) -> Result<Operator, sqlx::Error> {
        let id = OperatorId::from_str(&self.id)
            .map_err(|e| decode_error(format!("invalid operator id '{}': {e}", self.id)))?;
        let area_id = AreaId::from_str(&self.area_id)
            .map_err(|e| decode_error(format!("invalid area id '{}': {e}", self.area_id)))?;
        Ok(Operator {
            id,
            display_name: self.display_name,
            area_id,
            phone: self.phone,
            available: self.available,
        })
    }
}

/// Operator directory backed by PostgreSQL.
#[derive(Clone)]
pub struct PgOperatorDirectory {
    pool: PgPool,
}

impl PgOperatorDirectory {
    /// Creates a new directory.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the named areas that do not exist yet.
    ///
    /// Returns how many areas were created.
    pub async fn ensure_areas(&self, names: &[String]) -> Result<u64, sqlx::Error> {
        let mut created = 0;
        for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            let result = sqlx::query(
                r#"
                INSERT INTO areas (id, name)
                VALUES ($1, $2)
                ON CONFLICT (name) DO NOTHING
                "#,
            )
            .bind(AreaId::new().to_string())
            .bind(name)
            .execute(&self.pool)
            .await?;
            created += result.rows_affected();
        }
        if created > 0 {
            info!(created, "registered areas");
        }
        Ok(created)
    }
}

#[async_trait]
impl OperatorDirectory for PgOperatorDirectory {
    async fn find_area(&self, name: &str) -> Result<Option<Area>, DirectoryError> {
        let row: Option<AreaRow> =
            sqlx::query_as("SELECT id, name FROM areas WHERE lower(name) = lower($1)")
                .bind(name.trim())
                .fetch_optional(&self.pool)
                .await
                .map_err(lookup_failed)?;

        row.map(|r| r.try_into_area().map_err(lookup_failed))
            .transpose()
    }

    async fn find_available(
        &self,
        area_id: Option<AreaId>,
    ) -> Result<Vec<Operator>, DirectoryError> {
        let rows: Vec<OperatorRow> = sqlx::query_as(
            r#"
            SELECT id, display_name, area_id, phone, available
            FROM operators
            WHERE available AND ($1::TEXT IS NULL OR area_id = $1)
            ORDER BY id
            "#,
        )
        .bind(area_id.map(|id| id.to_string()))
        .fetch_all(&self.pool)
        .await
        .map_err(lookup_failed)?;

        rows.into_iter()
            .map(|r| r.try_into_operator().map_err(lookup_failed))
            .collect()
    }
}
