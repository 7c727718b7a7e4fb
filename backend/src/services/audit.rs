//! Audit trail for committed ledger operations
//!
//! Events are emitted after the business transaction commits. A recorder
//! failure is logged and swallowed, so it never undoes a committed sale,
//! payment or close.

use std::sync::Arc;

use async_trait::async_trait;
use shared::AuditEvent;
use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::AppResult;

/// Sink for audit events
#[async_trait]
pub trait AuditRecorder: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> AppResult<()>;
}

/// Writes events to the `audit_logs` table on its own connection
#[derive(Clone)]
pub struct PgAuditRecorder {
    db: PgPool,
}

impl PgAuditRecorder {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditRecorder for PgAuditRecorder {
    async fn record(&self, event: &AuditEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, business_id, user_id, action, entity_type, entity_id, details,
                ip_address, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event.business_id)
        .bind(event.actor_id)
        .bind(event.action.as_str())
        .bind(&event.entity_type)
        .bind(event.entity_id)
        .bind(&event.details)
        .bind(&event.origin)
        .bind(event.occurred_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

/// Emits each event as a structured `tracing` record
#[derive(Clone, Default)]
pub struct TracingAuditRecorder;

#[async_trait]
impl AuditRecorder for TracingAuditRecorder {
    async fn record(&self, event: &AuditEvent) -> AppResult<()> {
        tracing::info!(
            target: "audit",
            action = event.action.as_str(),
            entity_type = %event.entity_type,
            entity_id = ?event.entity_id,
            actor_id = ?event.actor_id,
            business_id = ?event.business_id,
            origin = ?event.origin,
            details = ?event.details,
            "audit event"
        );
        Ok(())
    }
}

/// Keeps events in memory
#[derive(Clone, Default)]
pub struct MemoryAuditRecorder {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemoryAuditRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl AuditRecorder for MemoryAuditRecorder {
    async fn record(&self, event: &AuditEvent) -> AppResult<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

/// Best-effort front for a recorder
#[derive(Clone)]
pub struct AuditTrail {
    recorder: Arc<dyn AuditRecorder>,
}

impl AuditTrail {
    pub fn new(recorder: Arc<dyn AuditRecorder>) -> Self {
        Self { recorder }
    }

    pub async fn emit(&self, event: AuditEvent) {
        if let Err(e) = self.recorder.record(&event).await {
            tracing::warn!(
                "Failed to record audit event {} {}: {}",
                event.action.as_str(),
                event.entity_type,
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use chrono::Utc;
    use shared::AuditAction;

    struct Unavailable;

    #[async_trait]
    impl AuditRecorder for Unavailable {
        async fn record(&self, _event: &AuditEvent) -> AppResult<()> {
            Err(AppError::Internal("sink down".to_string()))
        }
    }

    fn event() -> AuditEvent {
        AuditEvent {
            actor_id: Some(Uuid::new_v4()),
            business_id: Some(Uuid::new_v4()),
            action: AuditAction::Close,
            entity_type: "CashSession".to_string(),
            entity_id: Some(Uuid::new_v4()),
            details: Some(serde_json::json!({ "difference": "0" })),
            origin: Some("192.168.1.20".to_string()),
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_tracing_recorder_accepts_events() {
        assert!(TracingAuditRecorder.record(&event()).await.is_ok());

        let trail = AuditTrail::new(Arc::new(TracingAuditRecorder));
        trail.emit(event()).await;
    }

    #[tokio::test]
    async fn test_memory_recorder_keeps_order() {
        let memory = MemoryAuditRecorder::new();
        let trail = AuditTrail::new(Arc::new(memory.clone()));

        let first = event();
        let second = AuditEvent {
            action: AuditAction::Open,
            ..event()
        };
        trail.emit(first).await;
        trail.emit(second).await;

        let actions: Vec<_> = memory.events().await.iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![AuditAction::Close, AuditAction::Open]);
    }

    #[tokio::test]
    async fn test_failed_record_is_swallowed() {
        let trail = AuditTrail::new(Arc::new(Unavailable));
        // Must return normally
        trail.emit(event()).await;
    }
}
