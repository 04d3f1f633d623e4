//! Signed download grants
//!
//! A grant binds one discovered media URL (plus its quality and format
//! labels) to an opaque, expiring token. Handlers depend on the
//! [`GrantCodec`] trait; [`HmacGrantCodec`] is the implementation used in
//! production.
//!
//! Token layout: `base64url(claims JSON) "." base64url(HMAC-SHA256)`.
//! A verified grant is authentic, not safe: the proxy still checks the URL
//! host against its own allow-list.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::core::config;

type HmacSha256 = Hmac<Sha256>;

/// Payload of a download token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadGrant {
    pub url: String,
    pub quality: String,
    pub format: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GrantClaims {
    #[serde(flatten)]
    grant: DownloadGrant,
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    jti: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrantError {
    #[error("malformed token")]
    Malformed,
    #[error("signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("unexpected issuer or audience")]
    WrongAudience,
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Opaque sign/verify capability for download grants.
pub trait GrantCodec: Send + Sync {
    fn sign(&self, grant: &DownloadGrant) -> Result<String, GrantError>;
    fn verify(&self, token: &str) -> Result<DownloadGrant, GrantError>;
}

pub struct HmacGrantCodec {
    key: Vec<u8>,
    ttl_secs: i64,
    issuer: String,
    audience: String,
}

impl HmacGrantCodec {
    pub fn new(secret: impl AsRef<[u8]>, ttl_secs: i64, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            key: secret.as_ref().to_vec(),
            ttl_secs,
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }

    /// Codec using `GRANT_SECRET`, `GRANT_TTL_SECS`, `GRANT_ISSUER`, `GRANT_AUDIENCE`.
    pub fn from_config() -> Self {
        Self::new(
            config::grant::SECRET.as_bytes(),
            *config::grant::TTL_SECS,
            config::grant::ISSUER.as_str(),
            config::grant::AUDIENCE.as_str(),
        )
    }

    fn mac(&self) -> Result<HmacSha256, GrantError> {
        HmacSha256::new_from_slice(&self.key).map_err(|e| GrantError::Signing(e.to_string()))
    }
}

impl GrantCodec for HmacGrantCodec {
    fn sign(&self, grant: &DownloadGrant) -> Result<String, GrantError> {
        let now = chrono::Utc::now().timestamp();
        let claims = GrantClaims {
            grant: grant.clone(),
            exp: now + self.ttl_secs,
            iat: now,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        let json = serde_json::to_vec(&claims).map_err(|e| GrantError::Signing(e.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(json);

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{payload}.{signature}"))
    }

    fn verify(&self, token: &str) -> Result<DownloadGrant, GrantError> {
        let (payload, signature) = token.trim().split_once('.').ok_or(GrantError::Malformed)?;
        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| GrantError::Malformed)?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).map_err(|_| GrantError::BadSignature)?;

        let json = URL_SAFE_NO_PAD.decode(payload).map_err(|_| GrantError::Malformed)?;
        let claims: GrantClaims = serde_json::from_slice(&json).map_err(|_| GrantError::Malformed)?;

        if claims.iss != self.issuer || claims.aud != self.audience {
            return Err(GrantError::WrongAudience);
        }
        if claims.exp <= chrono::Utc::now().timestamp() {
            return Err(GrantError::Expired);
        }
        Ok(claims.grant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant() -> DownloadGrant {
        DownloadGrant {
            url: "https://rr3.googlevideo.com/videoplayback?id=1".to_string(),
            quality: "720p".to_string(),
            format: "mp4".to_string(),
        }
    }

    fn codec() -> HmacGrantCodec {
        HmacGrantCodec::new("test-secret", 60, "grabgate", "grabgate-download")
    }

    #[test]
    fn test_sign_then_verify() {
        let codec = codec();
        let token = codec.sign(&grant()).unwrap();
        assert_eq!(codec.verify(&token).unwrap(), grant());
    }

    #[test]
    fn test_tokens_are_unique() {
        let codec = codec();
        assert_ne!(codec.sign(&grant()).unwrap(), codec.sign(&grant()).unwrap());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let codec = codec();
        let token = codec.sign(&grant()).unwrap();
        let (_, sig) = token.split_once('.').unwrap();

        let forged = DownloadGrant {
            url: "https://attacker.example/x".to_string(),
            ..grant()
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&serde_json::json!({
                "url": forged.url, "quality": forged.quality, "format": forged.format,
                "exp": i64::MAX, "iat": 0, "iss": "grabgate", "aud": "grabgate-download", "jti": "x"
            }))
            .unwrap(),
        );
        assert_eq!(
            codec.verify(&format!("{forged_payload}.{sig}")),
            Err(GrantError::BadSignature)
        );
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = codec().sign(&grant()).unwrap();
        let other = HmacGrantCodec::new("other-secret", 60, "grabgate", "grabgate-download");
        assert_eq!(other.verify(&token), Err(GrantError::BadSignature));
    }

    #[test]
    fn test_expired_rejected() {
        let codec = HmacGrantCodec::new("test-secret", -10, "grabgate", "grabgate-download");
        let token = codec.sign(&grant()).unwrap();
        assert_eq!(codec.verify(&token), Err(GrantError::Expired));
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let token = codec().sign(&grant()).unwrap();
        let other = HmacGrantCodec::new("test-secret", 60, "grabgate", "someone-else");
        assert_eq!(other.verify(&token), Err(GrantError::WrongAudience));
    }

    #[test]
    fn test_garbage_rejected() {
        let codec = codec();
        assert_eq!(codec.verify("nodot"), Err(GrantError::Malformed));
        assert_eq!(codec.verify("a.!!!"), Err(GrantError::Malformed));
    }
}
