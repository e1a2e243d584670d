use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use sea_orm::ActiveValue::NotSet;
use serde_json::Value;
use uuid::Uuid;

use crate::{entity::audit_logs::ActiveModel as AuditActive, error::AppResult};

/// Append one row to `audit_logs`.
pub async fn log_audit<C: ConnectionTrait>(
    conn: &C,
    actor_id: Option<Uuid>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) -> AppResult<()> {
    AuditActive {
        id: Set(Uuid::new_v4()),
        actor_id: Set(actor_id),
        action: Set(action.to_string()),
        resource: Set(resource.map(str::to_string)),
        metadata: Set(metadata),
        created_at: NotSet,
    }
    .insert(conn)
    .await?;

    Ok(())
}

/// Audit after the business change has committed. A failed write is logged
/// and never fails the request.
pub async fn record_audit<C: ConnectionTrait>(
    conn: &C,
    actor_id: Option<Uuid>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) {
    if let Err(err) = log_audit(conn, actor_id, action, resource, metadata).await {
        tracing::warn!(error = %err, action, "audit log failed");
    }
}
