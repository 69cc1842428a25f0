use serde::{Deserialize, Serialize};

/// Claims carried by the upload form's CSRF token.
#[derive(Debug, Serialize, Deserialize)]
pub struct CsrfClaims {
    pub sub: String, // Form the token was issued for
    pub nonce: String,
    pub exp: usize,
    pub iat: usize,
}
