//! Payment method catalog
//!
//! Sales snapshot a method's name and credit flag, so deactivating or
//! renaming a method never rewrites past sales.

use serde::Deserialize;
use serde_json::json;
use shared::{validate_required_text, AuditAction, PaymentMethod};
use uuid::Uuid;
use validator::Validate;

use super::{LedgerEnv, RequestContext};
use crate::error::{AppError, AppResult};

/// Payment method service
#[derive(Clone)]
pub struct PaymentMethodService {
    env: LedgerEnv,
}

/// Input for creating a payment method
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentMethodInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    #[serde(default)]
    pub is_credit: bool,
}

impl PaymentMethodService {
    pub fn new(env: LedgerEnv) -> Self {
        Self { env }
    }

    /// Active payment methods ordered by name
    pub async fn list_payment_methods(
        &self,
        ctx: &RequestContext,
    ) -> AppResult<Vec<PaymentMethod>> {
        let mut tx = self.env.begin(ctx).await?;
        let methods = tx
            .list_payment_methods()
            .await?
            .into_iter()
            .filter(|m| m.is_active)
            .collect();
        Ok(methods)
    }

    /// Create a payment method; a business has at most one active credit method
    pub async fn create_payment_method(
        &self,
        ctx: &RequestContext,
        input: CreatePaymentMethodInput,
    ) -> AppResult<PaymentMethod> {
        input.validate()?;
        validate_required_text(&input.name).map_err(|m| AppError::invalid("name", m))?;

        let mut tx = self.env.begin(ctx).await?;

        if input.is_credit {
            let existing = tx.list_payment_methods().await?;
            if existing.iter().any(|m| m.is_credit && m.is_active) {
                return Err(AppError::invalid_state(
                    "A credit payment method already exists. Only one is allowed.",
                    "Ya existe un método de crédito (fiado). Solo se permite uno.",
                ));
            }
        }

        let method = PaymentMethod {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            description: input.description,
            is_credit: input.is_credit,
            is_default: false,
            is_active: true,
        };
        tx.insert_payment_method(&method).await?;
        tx.commit().await?;

        self.env
            .audit
            .emit(ctx.audit_event(
                AuditAction::Create,
                "PaymentMethod",
                Some(method.id),
                Some(json!({ "name": method.name, "is_credit": method.is_credit })),
            ))
            .await;

        Ok(method)
    }

    /// Deactivate a non-default payment method
    pub async fn deactivate_payment_method(
        &self,
        ctx: &RequestContext,
        method_id: Uuid,
    ) -> AppResult<PaymentMethod> {
        let mut tx = self.env.begin(ctx).await?;
        let mut method = tx
            .find_payment_method(method_id)
            .await?
            .filter(|m| m.is_active)
            .ok_or_else(|| AppError::NotFound("Payment method".to_string()))?;

        if method.is_default {
            return Err(AppError::invalid_state(
                "Default payment methods cannot be removed",
                "No puedes eliminar los métodos por defecto",
            ));
        }

        tx.set_payment_method_active(method_id, false).await?;
        tx.commit().await?;
        method.is_active = false;

        self.env
            .audit
            .emit(ctx.audit_event(
                AuditAction::Deactivate,
                "PaymentMethod",
                Some(method.id),
                None,
            ))
            .await;

        Ok(method)
    }
}
