/// Identity attached to a request that passed the API-key gate.
/// Used for rate limiting and logging; carries no raw key material.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiKeyIdentity {
    pub fingerprint: String,
}

impl ApiKeyIdentity {
    pub fn rate_limit_key(&self) -> String {
        format!("key:{}", self.fingerprint)
    }
}
