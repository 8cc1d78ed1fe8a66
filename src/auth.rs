use std::time::Duration;

use argon2::{
    Argon2,
    PasswordHash,
    PasswordVerifier,
    PasswordHasher,
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use argon2::password_hash::{SaltString, rand_core::OsRng as PHOsRng};

/// Verify password using Argon2 hash stored in DB.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(p) => p,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Hash a new password using Argon2id with a random salt.
/// The PHC string goes into usuarios.password.
pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut PHOsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| format!("argon2 hash error: {e}"))
}

/// Token claims. Field names are part of the wire contract with the frontends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub id: i32,
    pub email: String,
    pub rol: i32,
    #[serde(default)]
    pub permisos: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_doctor: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_verificado: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_paciente: Option<i32>,
    pub iat: i64,
    pub exp: i64,
}

/// Identity data that goes into a freshly issued token.
#[derive(Debug, Clone, Default)]
pub struct TokenSubject {
    pub user_id: i32,
    pub email: String,
    pub role: i32,
    pub permissions: Vec<String>,
    pub doctor_id: Option<i32>,
    pub doctor_verified: Option<bool>,
    pub patient_id: Option<i32>,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token encoding failed: {0}")]
    Encode(jsonwebtoken::errors::Error),
    #[error("token rejected: {0}")]
    Rejected(jsonwebtoken::errors::Error),
}

/// HS256 signing and verification keys plus the configured token lifetime.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, subject: &TokenSubject) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            id: subject.user_id,
            email: subject.email.clone(),
            rol: subject.role,
            permisos: subject.permissions.clone(),
            id_doctor: subject.doctor_id,
            doctor_verificado: subject.doctor_verified,
            id_paciente: subject.patient_id,
            iat: now,
            exp: now.saturating_add(i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX)),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(TokenError::Encode)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::Rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> TokenSubject {
        TokenSubject {
            user_id: 7,
            email: "ana@example.com".into(),
            role: 2,
            permissions: vec!["citas:crear".into()],
            doctor_id: Some(5),
            doctor_verified: Some(true),
            patient_id: None,
        }
    }

    #[test]
    fn issued_token_carries_auxiliary_claims() {
        let keys = JwtKeys::new("s3cret", Duration::from_secs(3600));
        let token = keys.issue(&subject()).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.id, 7);
        assert_eq!(claims.rol, 2);
        assert_eq!(claims.id_doctor, Some(5));
        assert_eq!(claims.doctor_verificado, Some(true));
        assert_eq!(claims.id_paciente, None);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let ours = JwtKeys::new("s3cret", Duration::from_secs(3600));
        let theirs = JwtKeys::new("not-ours", Duration::from_secs(3600));
        let token = theirs.issue(&subject()).unwrap();
        assert!(matches!(ours.verify(&token), Err(TokenError::Rejected(_))));
    }

    #[test]
    fn rejects_expired_token() {
        let keys = JwtKeys::new("s3cret", Duration::from_secs(3600));
        let now = Utc::now().timestamp();
        let stale = Claims {
            id: 1,
            email: "old@example.com".into(),
            rol: 1,
            permisos: vec![],
            id_doctor: None,
            doctor_verificado: None,
            id_paciente: None,
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = keys.sign(&stale).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn huge_lifetime_saturates_expiry() {
        let keys = JwtKeys::new("s3cret", Duration::MAX);
        let claims = keys.verify(&keys.issue(&subject()).unwrap()).unwrap();
        assert_eq!(claims.exp, i64::MAX);
    }

    #[test]
    fn rejects_garbage() {
        let keys = JwtKeys::new("s3cret", Duration::from_secs(60));
        assert!(keys.verify("not.a.jwt").is_err());
    }

    #[test]
    fn password_hash_verifies_only_original() {
        let phc = hash_password("correct horse").unwrap();
        assert!(phc.starts_with("$argon2"));
        assert!(verify_password("correct horse", &phc));
        assert!(!verify_password("battery staple", &phc));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
    }
}
