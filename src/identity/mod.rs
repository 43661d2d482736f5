//! Session resolution.
//!
//! Every request resolves to exactly one [`Identity`] for the duration of
//! the pipeline: an authenticated user when a valid session token is
//! present, otherwise an ephemeral guest. The distinction is carried as a
//! tagged enum, not a string convention, so entitlement logic can never be
//! confused by a coincidental email pattern.
//!
//! Resolution never fails: absence of a session is the guest path, not an
//! error.

use std::hash::{Hash, Hasher};

use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE, USER_AGENT};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entitlement::PlanType;

/// Session cookie name issued by the upstream auth provider.
const SESSION_COOKIE: &str = "harbor_session";

/// JWT claims carried in a session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,
    /// User email.
    pub email: String,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Plan hint from token issuance. Advisory only; admission decisions
    /// re-read the subscription row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanType>,
}

/// The resolved actor for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// A user with a verified session.
    Authenticated(AuthenticatedUser),
    /// An ephemeral guest with no durable identity.
    Guest(GuestIdentity),
}

/// A user with a verified session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Stable user ID.
    pub id: String,
    /// User email.
    pub email: String,
    /// Plan hint from the session token.
    pub plan_hint: Option<PlanType>,
}

/// An ephemeral guest identity, synthesized per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestIdentity {
    /// Freshly generated ID, valid for this request only.
    pub id: String,
    /// Low-assurance dedup key derived from network origin + client
    /// signature. Collisions and spoofing are acceptable.
    pub fingerprint: u64,
}

impl Identity {
    /// The effective identity ID.
    pub fn id(&self) -> &str {
        match self {
            Self::Authenticated(user) => &user.id,
            Self::Guest(guest) => &guest.id,
        }
    }

    /// Whether this identity is a guest.
    pub fn is_guest(&self) -> bool {
        matches!(self, Self::Guest(_))
    }

    /// Rate-limiting key for this identity. Authenticated users are keyed
    /// by user ID; guests by origin fingerprint, since their IDs are
    /// fresh per request.
    pub fn rate_key(&self) -> String {
        match self {
            Self::Authenticated(user) => user.id.clone(),
            Self::Guest(guest) => format!("guest:{:x}", guest.fingerprint),
        }
    }
}

/// Resolves the effective identity for a request.
#[derive(Debug, Clone)]
pub struct SessionResolver {
    jwt_secret: Option<String>,
}

impl SessionResolver {
    /// Create a resolver. Without a secret every request resolves to a
    /// guest.
    pub fn new(jwt_secret: Option<String>) -> Self {
        Self { jwt_secret }
    }

    /// Resolve the identity for a request.
    ///
    /// Checks the bearer token first, then the session cookie. Any
    /// invalid or expired token falls through to the guest path.
    pub fn resolve(&self, headers: &HeaderMap) -> Identity {
        if let Some(ref secret) = self.jwt_secret {
            if let Some(token) = extract_token(headers) {
                match validate_session(&token, secret) {
                    Ok(claims) => {
                        return Identity::Authenticated(AuthenticatedUser {
                            id: claims.sub,
                            email: claims.email,
                            plan_hint: claims.plan,
                        });
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Session token rejected, treating as guest");
                    }
                }
            }
        }

        Identity::Guest(GuestIdentity {
            id: format!("guest-{}", Uuid::new_v4()),
            fingerprint: fingerprint(headers),
        })
    }
}

/// Extract a session token from the bearer header or session cookie.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(header) = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok()) {
        if let Some(token) = header.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    let cookies = headers.get(COOKIE).and_then(|h| h.to_str().ok())?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

/// Validate a session token and return its claims.
pub fn validate_session(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// Derive a guest fingerprint from (first forwarded client address,
/// user-agent).
///
/// A cheap non-cryptographic hash reduced to u64. This is best-effort
/// deduplication, not an identity system.
pub fn fingerprint(headers: &HeaderMap) -> u64 {
    let client_addr = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .unwrap_or("unknown");

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("unknown");

    let mut hasher = std::hash::DefaultHasher::new();
    client_addr.hash(&mut hasher);
    user_agent.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn make_token(secret: &str, sub: &str, plan: Option<PlanType>) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            email: format!("{sub}@example.com"),
            exp: now + 3600,
            iat: now,
            plan,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn resolves_authenticated_from_bearer() {
        let resolver = SessionResolver::new(Some("secret".to_string()));
        let token = make_token("secret", "user-1", Some(PlanType::Pro));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, format!("Bearer {token}").parse().unwrap());

        match resolver.resolve(&headers) {
            Identity::Authenticated(user) => {
                assert_eq!(user.id, "user-1");
                assert_eq!(user.plan_hint, Some(PlanType::Pro));
            }
            Identity::Guest(_) => panic!("expected authenticated identity"),
        }
    }

    #[test]
    fn resolves_authenticated_from_cookie() {
        let resolver = SessionResolver::new(Some("secret".to_string()));
        let token = make_token("secret", "user-2", None);

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            format!("theme=dark; harbor_session={token}").parse().unwrap(),
        );

        assert!(matches!(
            resolver.resolve(&headers),
            Identity::Authenticated(user) if user.id == "user-2"
        ));
    }

    #[test]
    fn invalid_token_falls_back_to_guest() {
        let resolver = SessionResolver::new(Some("secret".to_string()));
        let token = make_token("wrong-secret", "user-3", None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, format!("Bearer {token}").parse().unwrap());

        assert!(resolver.resolve(&headers).is_guest());
    }

    #[test]
    fn missing_session_is_guest_not_error() {
        let resolver = SessionResolver::new(Some("secret".to_string()));
        let identity = resolver.resolve(&HeaderMap::new());
        assert!(identity.is_guest());
    }

    #[test]
    fn fingerprint_stable_for_same_origin() {
        let mut a = HeaderMap::new();
        a.insert("x-forwarded-for", "1.2.3.4, 10.0.0.1".parse().unwrap());
        a.insert(USER_AGENT, "test-agent".parse().unwrap());

        let mut b = HeaderMap::new();
        b.insert("x-forwarded-for", "1.2.3.4".parse().unwrap());
        b.insert(USER_AGENT, "test-agent".parse().unwrap());

        // Only the first forwarded address participates.
        assert_eq!(fingerprint(&a), fingerprint(&b));

        let mut c = HeaderMap::new();
        c.insert("x-forwarded-for", "5.6.7.8".parse().unwrap());
        c.insert(USER_AGENT, "test-agent".parse().unwrap());
        assert_ne!(fingerprint(&a), fingerprint(&c));
    }
}
