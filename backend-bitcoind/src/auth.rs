use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// How to authenticate against the node's RPC interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    None,
    UserPass { user: String, password: String },
    /// Path to the `.cookie` file bitcoind writes on startup.
    CookieFile(PathBuf),
}

impl Auth {
    /// Basic-auth credentials, reading the cookie file if needed.
    ///
    /// bitcoind rotates the cookie on restart, so callers holding on to the
    /// result must call this again after reconnecting.
    pub fn credentials(&self) -> Result<Option<(String, String)>> {
        match self {
            Auth::None => Ok(None),
            Auth::UserPass { user, password } => Ok(Some((user.clone(), password.clone()))),
            Auth::CookieFile(path) => {
                let content = fs::read_to_string(path).map_err(|source| Error::CookieRead {
                    path: path.clone(),
                    source,
                })?;
                parse_cookie(&content)
                    .map(Some)
                    .ok_or_else(|| Error::MalformedCookie(path.clone()))
            }
        }
    }
}

/// Splits `user:password` at the first colon. Passwords may contain colons.
pub fn parse_cookie(content: &str) -> Option<(String, String)> {
    let line = content.lines().next()?.trim();
    let (user, password) = line.split_once(':')?;
    if user.is_empty() {
        return None;
    }
    Some((user.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn cookie_splits_at_first_colon() {
        assert_eq!(
            parse_cookie("__cookie__:ab:cd\n"),
            Some(("__cookie__".to_string(), "ab:cd".to_string()))
        );
        assert_eq!(parse_cookie("no-separator"), None);
        assert_eq!(parse_cookie(":password"), None);
        assert_eq!(parse_cookie(""), None);
    }

    #[test]
    fn cookie_file_is_read_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "__cookie__:5e3f").unwrap();

        let auth = Auth::CookieFile(file.path().to_path_buf());
        assert_eq!(
            auth.credentials().unwrap(),
            Some(("__cookie__".to_string(), "5e3f".to_string()))
        );
    }

    #[test]
    fn missing_cookie_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let auth = Auth::CookieFile(dir.path().join(".cookie"));
        assert!(matches!(auth.credentials(), Err(Error::CookieRead { .. })));
    }
}
