//! Authentication middleware
//!
//! Validates the bearer token and exposes the caller's business and
//! capability set to handlers. Tokens are issued elsewhere; this service only
//! verifies them.

use axum::{
    extract::{FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::RequestContext;
use crate::store::TenantScope;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub business_id: Uuid,
    pub role_id: Uuid,
    /// Capabilities such as `sales.create`
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Check if user has a specific permission
    pub fn has_permission(&self, resource: &str, action: &str) -> bool {
        let permission = format!("{}.{}", resource, action);
        self.permissions.contains(&permission)
    }

    /// Check if user has any of the specified permissions
    pub fn has_any_permission(&self, perms: &[(&str, &str)]) -> bool {
        perms.iter().any(|(r, a)| self.has_permission(r, a))
    }

    /// Fail with `InsufficientPermissions` unless the capability is held
    pub fn require(&self, resource: &str, action: &str) -> AppResult<()> {
        if self.has_permission(resource, action) {
            Ok(())
        } else {
            Err(AppError::InsufficientPermissions(format!(
                "{}.{}",
                resource, action
            )))
        }
    }

    /// Request context bound to the user's business
    pub fn context(&self, origin: ClientOrigin) -> RequestContext {
        RequestContext::new(TenantScope::new(self.business_id), self.user_id)
            .with_origin(origin.0)
    }
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => {
            return unauthorized("Missing or invalid Authorization header").into_response();
        }
    };

    // Middleware runs without state, so the secret comes from the environment
    let jwt_secret = std::env::var("TENDERO__JWT__SECRET")
        .or_else(|_| std::env::var("TENDERO_JWT_SECRET"))
        .unwrap_or_else(|_| "development-secret-key".to_string());

    let claims = match decode_jwt(token, &jwt_secret) {
        Ok(claims) => claims,
        Err(e) => return e.into_response(),
    };

    let auth_user = match claims.into_auth_user() {
        Ok(user) => user,
        Err(msg) => return unauthorized(msg).into_response(),
    };

    request.extensions_mut().insert(auth_user);

    next.run(request).await
}

/// JWT claims structure
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    sub: String,
    business_id: String,
    role_id: String,
    #[serde(default)]
    permissions: Vec<String>,
    exp: i64,
    iat: i64,
}

impl Claims {
    fn into_auth_user(self) -> Result<AuthUser, &'static str> {
        let user_id = Uuid::parse_str(&self.sub).map_err(|_| "Invalid user ID in token")?;
        let business_id =
            Uuid::parse_str(&self.business_id).map_err(|_| "Invalid business ID in token")?;
        let role_id = Uuid::parse_str(&self.role_id).map_err(|_| "Invalid role ID in token")?;

        Ok(AuthUser {
            user_id,
            business_id,
            role_id,
            permissions: self.permissions,
        })
    }
}

/// Decode and validate JWT token
fn decode_jwt(token: &str, secret: &str) -> AppResult<Claims> {
    use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })
}

fn unauthorized(message: &str) -> AppError {
    AppError::Unauthorized {
        message: message.to_string(),
        message_es: "No autorizado".to_string(),
    }
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| unauthorized("Authentication required"))
    }
}

/// First address in `x-forwarded-for`, recorded on audit events
#[derive(Clone, Debug, Default)]
pub struct ClientOrigin(pub Option<String>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for ClientOrigin
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let origin = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        Ok(ClientOrigin(origin))
    }
}
