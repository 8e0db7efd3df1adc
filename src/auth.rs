use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::errors::GameError;
use crate::models::session::Session;

// Resolves a bearer token into the session it stands for
pub trait SessionValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<Session, GameError>;
}

// The claims struct carried by a Bearer token
#[derive(Deserialize, Serialize, Debug)]
pub struct Claims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

// Validates HS256 tokens signed with a shared secret. The `sub` claim is the session.
pub struct JwtValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtValidator {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Mints a token for `subject` valid for `ttl_secs` seconds.
    pub fn issue(&self, subject: &str, ttl_secs: i64) -> Result<String, GameError> {
        let now = Utc::now();
        let exp = now
            .checked_add_signed(Duration::seconds(ttl_secs))
            .ok_or_else(|| GameError::Internal("token expiry out of range".to_string()))?;
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(|err| {
            error!("Unexpected error while encoding the bearer token ({:?})", err);
            GameError::Internal("could not encode token".to_string())
        })
    }
}

impl SessionValidator for JwtValidator {
    fn validate(&self, token: &str) -> Result<Session, GameError> {
        match decode::<Claims>(token, &self.decoding, &Validation::default()) {
            Ok(data) if !data.claims.sub.is_empty() => Ok(Session::new(data.claims.sub)),
            Ok(_) => {
                debug!("Token without subject");
                Err(GameError::Unauthorized)
            }
            Err(err) => {
                debug!("Invalid token: {:?}", err.kind());
                Err(GameError::Unauthorized)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_resolves_to_its_subject() {
        let jwt = JwtValidator::new("secret");
        let token = jwt.issue("alice", 60).unwrap();
        assert_eq!(jwt.validate(&token), Ok(Session::new("alice")));
    }

    #[test]
    fn foreign_and_expired_tokens_are_rejected() {
        let ours = JwtValidator::new("secret");
        let theirs = JwtValidator::new("other");
        let token = theirs.issue("alice", 60).unwrap();
        assert_eq!(ours.validate(&token), Err(GameError::Unauthorized));

        // well past the default leeway of 60 seconds
        let expired = ours.issue("alice", -600).unwrap();
        assert_eq!(ours.validate(&expired), Err(GameError::Unauthorized));
        assert_eq!(ours.validate("garbage"), Err(GameError::Unauthorized));
    }
}
