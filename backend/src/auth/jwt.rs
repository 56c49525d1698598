//! HS256 identity tokens.
//!
//! Notes:
//! - Header and payload are JSON, base64url encoded WITHOUT padding.
//! - The signature is checked with `Mac::verify_slice` before any claim is
//!   read, so expiry is only trusted on an authentic token.
//! - Tokens are stateless; there is no revocation.

use super::errors::IdentityTokenError;
use super::models::Claims;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const ALG: &str = "HS256";
const TYP: &str = "JWT";

#[derive(Debug, Serialize, Deserialize)]
struct JwtHeader {
    alg: String,
    typ: String,
}

fn b64url_decode(s: &str) -> Result<Vec<u8>, IdentityTokenError> {
    URL_SAFE_NO_PAD
        .decode(s.as_bytes())
        .map_err(|_| IdentityTokenError::Malformed)
}

/// Issues and verifies signed bearer tokens with a server-held secret.
pub struct IdentityTokenIssuer {
    secret: Vec<u8>,
    ttl: Duration,
}

impl IdentityTokenIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, IdentityTokenError> {
        if secret.is_empty() {
            return Err(IdentityTokenError::Signing("empty signing secret".to_string()));
        }
        Ok(Self {
            secret: secret.to_vec(),
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String, IdentityTokenError> {
        self.issue_at(user_id, Utc::now())
    }

    pub fn issue_at(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<String, IdentityTokenError> {
        let header = JwtHeader {
            alg: ALG.to_string(),
            typ: TYP.to_string(),
        };
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| IdentityTokenError::Signing("token lifetime out of range".to_string()))?;
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let header_json = serde_json::to_vec(&header)
            .map_err(|e| IdentityTokenError::Signing(format!("header: {}", e)))?;
        let claims_json = serde_json::to_vec(&claims)
            .map_err(|e| IdentityTokenError::Signing(format!("claims: {}", e)))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );
        let signature = self.mac(&signing_input)?.finalize().into_bytes();

        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
    }

    /// Verify a token and return its subject.
    pub fn verify(&self, token: &str) -> Result<Uuid, IdentityTokenError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Uuid, IdentityTokenError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(IdentityTokenError::Malformed);
        };

        let header: JwtHeader = serde_json::from_slice(&b64url_decode(header_b64)?)
            .map_err(|_| IdentityTokenError::Malformed)?;
        if header.alg != ALG || !header.typ.eq_ignore_ascii_case(TYP) {
            return Err(IdentityTokenError::Malformed);
        }

        let signature = b64url_decode(sig_b64)?;
        let signing_input = format!("{}.{}", header_b64, payload_b64);
        self.mac(&signing_input)?
            .verify_slice(&signature)
            .map_err(|_| IdentityTokenError::BadSignature)?;

        let claims: Claims = serde_json::from_slice(&b64url_decode(payload_b64)?)
            .map_err(|_| IdentityTokenError::Malformed)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| IdentityTokenError::Malformed)?;

        if now.timestamp() >= claims.exp {
            return Err(IdentityTokenError::Expired);
        }

        Ok(user_id)
    }

    fn mac(&self, signing_input: &str) -> Result<HmacSha256, IdentityTokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| IdentityTokenError::Signing(e.to_string()))?;
        mac.update(signing_input.as_bytes());
        Ok(mac)
    }
}
