use std::fmt;

use zeroize::Zeroizing;

/// A string whose memory is zeroized on drop and never printed.
#[derive(Clone, Default)]
pub struct SecureString(Zeroizing<String>);

impl SecureString {
    pub fn new(s: String) -> Self {
        Self(Zeroizing::new(s))
    }

    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl PartialEq for SecureString {
    fn eq(&self, other: &Self) -> bool {
        self.expose_secret() == other.expose_secret()
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureString([REDACTED])")
    }
}

/// Operator login, supplied by the caller for one run.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub email: String,
    pub password: SecureString,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<SecureString>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Browser-session material returned by a successful login.
#[derive(Clone, Debug)]
pub struct SessionTokens {
    pub(crate) user_token: SecureString,
    pub(crate) csrf_token: SecureString,
    pub organization_id: String,
    pub user_id: String,
}

impl SessionTokens {
    pub fn new(
        user_token: impl Into<SecureString>,
        csrf_token: impl Into<SecureString>,
        organization_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            user_token: user_token.into(),
            csrf_token: csrf_token.into(),
            organization_id: organization_id.into(),
            user_id: user_id.into(),
        }
    }

    /// The cookie header the internal surface expects alongside the CSRF header.
    pub(crate) fn cookie(&self) -> String {
        format!(
            "auth={}; org={}; usr={}; token={};",
            self.user_token.expose_secret(),
            self.organization_id,
            self.user_id,
            self.csrf_token.expose_secret()
        )
    }

    pub(crate) fn csrf(&self) -> &str {
        self.csrf_token.expose_secret()
    }
}
