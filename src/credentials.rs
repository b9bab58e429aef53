use std::fmt;

/// Environment variable holding a combined `ID:SECRET` key.
pub const ENV_KEY: &str = "GENMEDIA_KEY";
/// Environment variable holding the key identifier.
pub const ENV_KEY_ID: &str = "GENMEDIA_KEY_ID";
/// Environment variable holding the key secret.
pub const ENV_KEY_SECRET: &str = "GENMEDIA_KEY_SECRET";

/// An API key identifier and its secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub key_id: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            secret: secret.into(),
        }
    }

    /// Split a combined `ID:SECRET` value on its first colon.
    ///
    /// Returns `None` when there is no colon or either half is empty.
    pub fn parse(combined: &str) -> Option<Self> {
        let (key_id, secret) = combined.trim().split_once(':')?;
        if key_id.is_empty() || secret.is_empty() {
            return None;
        }
        Some(Self::new(key_id, secret))
    }

    /// The combined `ID:SECRET` form used by `Authorization: Key ...`.
    pub(crate) fn combined(&self) -> String {
        format!("{}:{}", self.key_id, self.secret)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key_id", &self.key_id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Source of credentials consulted when none were configured explicitly.
pub trait CredentialsProvider: Send + Sync {
    fn resolve(&self) -> Option<Credentials>;
}

/// Reads [`ENV_KEY`], falling back to [`ENV_KEY_ID`] + [`ENV_KEY_SECRET`]
/// when it is unset, empty, or not of the form `ID:SECRET`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl CredentialsProvider for EnvCredentials {
    fn resolve(&self) -> Option<Credentials> {
        resolve_from(|name| std::env::var(name).ok())
    }
}

fn resolve_from(lookup: impl Fn(&str) -> Option<String>) -> Option<Credentials> {
    if let Some(creds) = lookup(ENV_KEY).as_deref().and_then(Credentials::parse) {
        return Some(creds);
    }
    let key_id = lookup(ENV_KEY_ID).filter(|v| !v.is_empty())?;
    let secret = lookup(ENV_KEY_SECRET).filter(|v| !v.is_empty())?;
    Some(Credentials::new(key_id, secret))
}

impl CredentialsProvider for Credentials {
    fn resolve(&self) -> Option<Credentials> {
        Some(self.clone())
    }
}
