use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo_types::Role;

/// JWT payload asserted by a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,    // user ID
    pub role: Role,   // role at issue time
    pub iat: usize,   // issued at (unix timestamp)
    pub exp: usize,   // expires at (unix timestamp)
    pub iss: String,  // issuer
    pub aud: String,  // audience
}
