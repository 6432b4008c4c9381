//! PostgreSQL-backed conversation store.
//!
//! Turns live in `conversation_turns`, ordered by a per-conversation `seq`.
//! Appends lock the conversation row so that the repeat check and the insert
//! happen atomically for one user.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relaydesk_conversation::{
    AppendOutcome, ConversationStore, ConversationSummary, StoreError, ToolInvocation, Turn,
    TurnRole,
};
use relaydesk_core::{ConversationId, OperatorId, UserId};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::{debug, instrument};

fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        message,
    )))
}

fn storage_failed(e: sqlx::Error) -> StoreError {
    StoreError::StorageFailed {
        reason: e.to_string(),
    }
}

/// Row type for turn queries.
#[derive(FromRow)]
struct TurnRow {
    seq: i64,
    role: String,
    content: String,
    tool_call_id: Option<String>,
    tool_invocations: Option<String>,
    created_at: DateTime<Utc>,
}

impl TurnRow {
    fn try_into_turn(self) -> Result<Turn, sqlx::Error> {
        decode_turn(
            &self.role,
            self.content,
            self.tool_call_id,
            self.tool_invocations,
            self.created_at,
        )
    }
}

fn decode_turn(
    role: &str,
    content: String,
    tool_call_id: Option<String>,
    tool_invocations: Option<String>,
    timestamp: DateTime<Utc>,
) -> Result<Turn, sqlx::Error> {
    let role = TurnRole::from_str_value(role)
        .ok_or_else(|| decode_error(format!("unknown turn role '{role}'")))?;

    match role {
        TurnRole::User => Ok(Turn::User { content, timestamp }),
        TurnRole::Assistant => {
            let tool_invocations = match tool_invocations {
                Some(json) => serde_json::from_str::<Vec<ToolInvocation>>(&json)
                    .map_err(|e| decode_error(format!("invalid tool invocations: {e}")))?,
                None => Vec::new(),
            };
            Ok(Turn::Assistant {
                content,
                timestamp,
                tool_invocations,
            })
        }
        TurnRole::Tool => {
            let tool_call_id = tool_call_id
                .ok_or_else(|| decode_error("tool turn without tool_call_id".to_string()))?;
            Ok(Turn::Tool {
                content,
                tool_call_id,
                timestamp,
            })
        }
    }
}

/// Serializes the invocations of an assistant turn; `None` when there are none.
fn encode_invocations(turn: &Turn) -> Result<Option<String>, StoreError> {
    if !turn.has_tool_invocations() {
        return Ok(None);
    }
    serde_json::to_string(turn.tool_invocations())
        .map(Some)
        .map_err(|e| StoreError::InvalidTurn {
            reason: format!("tool invocations not serializable: {e}"),
        })
}

/// Row type for summary queries.
#[derive(FromRow)]
struct SummaryRow {
    id: String,
    user_id: String,
    created_at: DateTime<Utc>,
    last_contact_at: DateTime<Utc>,
    needs_human_response: bool,
    assigned_area: Option<String>,
    assigned_advisor: Option<String>,
    turn_count: i64,
    last_role: Option<String>,
    last_content: Option<String>,
    last_tool_call_id: Option<String>,
    last_tool_invocations: Option<String>,
    last_created_at: Option<DateTime<Utc>>,
}

impl SummaryRow {
    fn try_into_summary(self) -> Result<ConversationSummary, sqlx::Error> {
        let id = ConversationId::from_str(&self.id)
            .map_err(|e| decode_error(format!("invalid conversation id '{}': {e}", self.id)))?;
        let assigned_advisor = self
            .assigned_advisor
            .as_deref()
            .map(OperatorId::from_str)
            .transpose()
            .map_err(|e| decode_error(format!("invalid operator id: {e}")))?;
        let last_turn = match (self.last_role, self.last_content, self.last_created_at) {
            (Some(role), Some(content), Some(created_at)) => Some(decode_turn(
                &role,
                content,
                self.last_tool_call_id,
                self.last_tool_invocations,
                created_at,
            )?),
            _ => None,
        };

        Ok(ConversationSummary {
            id,
            user_id: UserId::new(self.user_id),
            created_at: self.created_at,
            last_contact_at: self.last_contact_at,
            needs_human_response: self.needs_human_response,
            assigned_area: self.assigned_area,
            assigned_advisor,
            last_turn,
            turn_count: usize::try_from(self.turn_count).unwrap_or(0),
        })
    }
}

const SUMMARY_SELECT: &str = r#"
    SELECT c.id, c.user_id, c.created_at, c.last_contact_at, c.needs_human_response,
           c.assigned_area, c.assigned_advisor,
           (SELECT count(*) FROM conversation_turns t WHERE t.conversation_id = c.id)
               AS turn_count,
           lt.role AS last_role, lt.content AS last_content,
           lt.tool_call_id AS last_tool_call_id,
           lt.tool_invocations AS last_tool_invocations,
           lt.created_at AS last_created_at
    FROM conversations c
    LEFT JOIN LATERAL (
        SELECT role, content, tool_call_id, tool_invocations, created_at
        FROM conversation_turns t
        WHERE t.conversation_id = c.id
        ORDER BY seq DESC
        LIMIT 1
    ) lt ON TRUE
"#;

/// Conversation store backed by PostgreSQL.
#[derive(Clone)]
pub struct PgConversationStore {
    pool: PgPool,
}

impl PgConversationStore {
    /// Creates a new store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn update_existing(
        &self,
        user_id: &UserId,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<(), StoreError> {
        let result = query.execute(&self.pool).await.map_err(storage_failed)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                user_id: user_id.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for PgConversationStore {
    #[instrument(skip(self, turn), fields(user_id = %user_id, role = %turn.role()))]
    async fn append_turn(
        &self,
        user_id: &UserId,
        turn: Turn,
    ) -> Result<AppendOutcome, StoreError> {
        turn.validate()
            .map_err(|reason| StoreError::InvalidTurn { reason })?;
        let tool_invocations = encode_invocations(&turn)?;

        let mut tx = self.pool.begin().await.map_err(storage_failed)?;

        sqlx::query(
            r#"
            INSERT INTO conversations (id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(ConversationId::new().to_string())
        .bind(user_id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(storage_failed)?;

        let conversation_id: String =
            sqlx::query_scalar("SELECT id FROM conversations WHERE user_id = $1 FOR UPDATE")
                .bind(user_id.as_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(storage_failed)?;

        let last: Option<TurnRow> = sqlx::query_as(
            r#"
            SELECT seq, role, content, tool_call_id, tool_invocations, created_at
            FROM conversation_turns
            WHERE conversation_id = $1
            ORDER BY seq DESC
            LIMIT 1
            "#,
        )
        .bind(&conversation_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_failed)?;

        let next_seq = last.as_ref().map_or(1, |row| row.seq + 1);
        if let Some(row) = last {
            let last = row.try_into_turn().map_err(storage_failed)?;
            if last.repeats(&turn) {
                tx.rollback().await.map_err(storage_failed)?;
                debug!("suppressed repeated turn");
                return Ok(AppendOutcome::NoOp);
            }
        }

        sqlx::query(
            r#"
            INSERT INTO conversation_turns
                (conversation_id, seq, role, content, tool_call_id, tool_invocations, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&conversation_id)
        .bind(next_seq)
        .bind(turn.role().as_str())
        .bind(turn.content())
        .bind(turn.tool_call_id())
        .bind(tool_invocations)
        .bind(turn.timestamp())
        .execute(&mut *tx)
        .await
        .map_err(storage_failed)?;

        sqlx::query("UPDATE conversations SET last_contact_at = now() WHERE id = $1")
            .bind(&conversation_id)
            .execute(&mut *tx)
            .await
            .map_err(storage_failed)?;

        tx.commit().await.map_err(storage_failed)?;
        Ok(AppendOutcome::Appended)
    }

    async fn get_history(&self, user_id: &UserId) -> Result<Vec<Turn>, StoreError> {
        let rows: Vec<TurnRow> = sqlx::query_as(
            r#"
            SELECT t.seq, t.role, t.content, t.tool_call_id, t.tool_invocations, t.created_at
            FROM conversation_turns t
            JOIN conversations c ON c.id = t.conversation_id
            WHERE c.user_id = $1
            ORDER BY t.seq ASC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_failed)?;

        rows.into_iter()
            .map(|r| r.try_into_turn().map_err(storage_failed))
            .collect()
    }

    async fn recent_turns(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<Turn>, StoreError> {
        let rows: Vec<TurnRow> = sqlx::query_as(
            r#"
            SELECT t.seq, t.role, t.content, t.tool_call_id, t.tool_invocations, t.created_at
            FROM conversation_turns t
            JOIN conversations c ON c.id = t.conversation_id
            WHERE c.user_id = $1
            ORDER BY t.seq DESC
            LIMIT $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_failed)?;

        rows.into_iter()
            .rev()
            .map(|r| r.try_into_turn().map_err(storage_failed))
            .collect()
    }

    async fn summary(&self, user_id: &UserId) -> Result<Option<ConversationSummary>, StoreError> {
        let row: Option<SummaryRow> =
            sqlx::query_as(&format!("{SUMMARY_SELECT} WHERE c.user_id = $1"))
                .bind(user_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_failed)?;

        row.map(|r| r.try_into_summary().map_err(storage_failed))
            .transpose()
    }

    #[instrument(skip(self), fields(user_id = %user_id, operator_id = %operator_id))]
    async fn assign_advisor(
        &self,
        user_id: &UserId,
        operator_id: OperatorId,
    ) -> Result<(), StoreError> {
        self.update_existing(
            user_id,
            sqlx::query("UPDATE conversations SET assigned_advisor = $2 WHERE user_id = $1")
                .bind(user_id.as_str())
                .bind(operator_id.to_string()),
        )
        .await
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn mark_delegated(&self, user_id: &UserId, area: &str) -> Result<(), StoreError> {
        self.update_existing(
            user_id,
            sqlx::query(
                r#"
                UPDATE conversations
                SET needs_human_response = TRUE, assigned_area = $2, assigned_advisor = NULL
                WHERE user_id = $1
                "#,
            )
            .bind(user_id.as_str())
            .bind(area),
        )
        .await
    }

    async fn pending_assignments(
        &self,
        operator_id: OperatorId,
    ) -> Result<Vec<ConversationSummary>, StoreError> {
        let rows: Vec<SummaryRow> = sqlx::query_as(&format!(
            "{SUMMARY_SELECT} WHERE c.assigned_advisor = $1 AND c.needs_human_response \
             ORDER BY c.last_contact_at ASC"
        ))
        .bind(operator_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_failed)?;

        rows.into_iter()
            .map(|r| r.try_into_summary().map_err(storage_failed))
            .collect()
    }
}
