use anyhow::Context as _;
use http::header::HeaderValue;
use std::fmt;

/// The environment variable holding the bearer token
pub const ACCESS_TOKEN: &str = "DROPBOX_ACCESS_TOKEN";

const TOKEN_TYPE: &str = "Bearer";

/// Looks up an environment variable, swappable so tests never touch the real
/// process environment
pub type EnvLookup = fn(&str) -> Option<String>;

/// Reads from the process environment
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// An opaque bearer token
pub struct Token(String);

impl Token {
    /// Renders the value of the `Authorization` header
    pub fn header_value(&self) -> anyhow::Result<HeaderValue> {
        let mut hv = HeaderValue::from_str(&format!("{TOKEN_TYPE} {}", self.0))
            .context("the access token contains characters not allowed in a header")?;
        hv.set_sensitive(true);
        Ok(hv)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

/// Resolves the access token. This is done fresh every time, nothing is cached.
pub fn resolve(env: EnvLookup) -> anyhow::Result<Token> {
    match env(ACCESS_TOKEN) {
        Some(token) if !token.is_empty() => Ok(Token(token)),
        _ => anyhow::bail!("please set the environment variable {ACCESS_TOKEN}"),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_names_the_variable() {
        let err = resolve(|_| None).unwrap_err();
        assert!(err.to_string().contains(ACCESS_TOKEN));
    }

    #[test]
    fn empty_is_missing() {
        let err = resolve(|_| Some(String::new())).unwrap_err();
        assert!(err.to_string().contains(ACCESS_TOKEN));
    }

    #[test]
    fn renders_bearer_header() {
        let token = resolve(|name| (name == ACCESS_TOKEN).then(|| "sl.abc123".to_owned())).unwrap();
        let hv = token.header_value().unwrap();

        assert_eq!(hv.to_str().unwrap(), "Bearer sl.abc123");
        assert!(hv.is_sensitive());
        assert_eq!(format!("{token:?}"), "Token(<redacted>)");
    }

    #[test]
    fn rejects_newlines() {
        let token = resolve(|_| Some("abc\r\nX-Evil: 1".to_owned())).unwrap();
        assert!(token.header_value().is_err());
    }
}
