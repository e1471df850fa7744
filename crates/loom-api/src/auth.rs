//! Principal resolution.
//!
//! Every command receives an already-resolved [`Principal`]. The transport
//! turns the `Authorization` header into one through a [`PrincipalResolver`];
//! [`JwtPrincipalResolver`] is the HS256 implementation.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult, ErrorCode};

// =============================================================================
// Principal
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Cashier,
    Admin,
}

impl StaffRole {
    pub const fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Cashier => "cashier",
            StaffRole::Admin => "admin",
        }
    }
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is calling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Storefront shopper: owns a cart and orders.
    Customer { id: String },
    /// Cashier or back-office user.
    Staff { id: String, role: StaffRole },
}

impl Principal {
    pub fn customer(id: impl Into<String>) -> Self {
        Principal::Customer { id: id.into() }
    }

    pub fn staff(id: impl Into<String>, role: StaffRole) -> Self {
        Principal::Staff {
            id: id.into(),
            role,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Principal::Customer { id } | Principal::Staff { id, .. } => id,
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Principal::Staff { .. })
    }

    /// The customer id, or `AUTHENTICATION_ERROR`.
    pub fn require_customer(&self) -> ApiResult<&str> {
        match self {
            Principal::Customer { id } => Ok(id),
            Principal::Staff { .. } => Err(ApiError::unauthenticated(
                "A customer session is required",
            )),
        }
    }

    /// The staff id, or `AUTHENTICATION_ERROR`.
    pub fn require_staff(&self) -> ApiResult<&str> {
        match self {
            Principal::Staff { id, .. } => Ok(id),
            Principal::Customer { .. } => {
                Err(ApiError::unauthenticated("A staff session is required"))
            }
        }
    }

    /// The staff id of an admin, or `AUTHENTICATION_ERROR`.
    pub fn require_admin(&self) -> ApiResult<&str> {
        match self {
            Principal::Staff {
                id,
                role: StaffRole::Admin,
            } => Ok(id),
            _ => Err(ApiError::unauthenticated("An admin session is required")),
        }
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Turns a bearer credential into a principal.
pub trait PrincipalResolver: Send + Sync {
    /// `None` means no credential was presented.
    fn resolve(&self, bearer: Option<&str>) -> ApiResult<Principal>;
}

/// Token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (customer or staff id)
    pub sub: String,

    /// `customer`, `cashier` or `admin`
    pub role: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

const CUSTOMER_ROLE: &str = "customer";

impl FromStr for StaffRole {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cashier" => Ok(StaffRole::Cashier),
            "admin" => Ok(StaffRole::Admin),
            other => Err(ApiError::unauthenticated(format!("Unknown role: {}", other))),
        }
    }
}

/// HS256 token issuer and validator.
pub struct JwtPrincipalResolver {
    secret: String,
    lifetime_secs: i64,
}

impl JwtPrincipalResolver {
    pub fn new(secret: impl Into<String>, lifetime_secs: i64) -> Self {
        JwtPrincipalResolver {
            secret: secret.into(),
            lifetime_secs,
        }
    }

    /// Issues a token for `principal`.
    pub fn issue(&self, principal: &Principal) -> ApiResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_secs);

        let role = match principal {
            Principal::Customer { .. } => CUSTOMER_ROLE,
            Principal::Staff { role, .. } => role.as_str(),
        };

        let claims = Claims {
            sub: principal.id().to_string(),
            role: role.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to issue token");
            ApiError::new(ErrorCode::TransactionFailure, "Failed to issue token")
        })
    }

    /// Validates and decodes a token.
    pub fn validate_token(&self, token: &str) -> ApiResult<Claims> {
        let token_data: TokenData<Claims> = decode(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| ApiError::unauthenticated(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }
}

impl PrincipalResolver for JwtPrincipalResolver {
    fn resolve(&self, bearer: Option<&str>) -> ApiResult<Principal> {
        let token = bearer
            .and_then(extract_bearer_token)
            .ok_or_else(|| ApiError::unauthenticated("Missing bearer token"))?;

        let claims = self.validate_token(token)?;
        if claims.sub.trim().is_empty() {
            return Err(ApiError::unauthenticated("Token has no subject"));
        }

        if claims.role == CUSTOMER_ROLE {
            Ok(Principal::customer(claims.sub))
        } else {
            let role = claims.role.parse()?;
            Ok(Principal::staff(claims.sub, role))
        }
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
