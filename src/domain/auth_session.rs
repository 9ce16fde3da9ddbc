/// A freshly issued token pair: a signed access token and the raw refresh
/// identifier. The refresh identifier never exists anywhere else in the
/// clear; the store only sees its hash.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
}
