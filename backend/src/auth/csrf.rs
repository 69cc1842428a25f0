use super::models::CsrfClaims;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

const UPLOAD_FORM: &str = "upload";
const TOKEN_LIFETIME_HOURS: i64 = 1;

#[derive(Debug, thiserror::Error)]
pub enum CsrfError {
    #[error("CSRF token encoding error: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
    #[error("The CSRF token is missing.")]
    Missing,
    #[error("The CSRF token is invalid.")]
    InvalidToken,
    #[error("The CSRF token has expired.")]
    TokenExpired,
}

/// Issues and checks the signed tokens embedded in the upload form.
#[derive(Clone)]
pub struct CsrfService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl CsrfService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
        }
    }

    pub fn generate_token(&self) -> Result<String, CsrfError> {
        let now = Utc::now();
        let expiration = now + Duration::hours(TOKEN_LIFETIME_HOURS);
        let nonce: [u8; 8] = rand::random();

        let claims = CsrfClaims {
            sub: UPLOAD_FORM.to_string(),
            nonce: hex::encode(nonce),
            exp: expiration.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let header = Header::new(Algorithm::HS256);
        encode(&header, &claims, &self.encoding_key).map_err(CsrfError::Encoding)
    }

    pub fn verify_token(&self, token: Option<&str>) -> Result<(), CsrfError> {
        let token = match token {
            Some(token) if !token.is_empty() => token,
            _ => return Err(CsrfError::Missing),
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.sub = Some(UPLOAD_FORM.to_string());

        match decode::<CsrfClaims>(token, &self.decoding_key, &validation) {
            Ok(_) => Ok(()),
            Err(err) => {
                log::debug!("CSRF token rejected: {:?}", err);
                match err.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        Err(CsrfError::TokenExpired)
                    }
                    _ => Err(CsrfError::InvalidToken),
                }
            }
        }
    }
}
