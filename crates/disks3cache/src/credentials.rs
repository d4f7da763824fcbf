//! Static AWS credentials from the environment or the shared credentials file
//!
//! When neither source has a key pair, the remote tier falls through to the
//! web identity, container and instance metadata providers of the S3 client.

use crate::error::{CacheError, Result};
use std::fmt;
use std::path::PathBuf;

const DEFAULT_PROFILE: &str = "default";

/// An AWS key pair with an optional session token
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    /// Resolve static credentials from a variable lookup.
    ///
    /// `AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY` win and must be set
    /// together. Otherwise the `AWS_PROFILE` section (default `default`) of
    /// `AWS_SHARED_CREDENTIALS_FILE` (default `$HOME/.aws/credentials`) is
    /// used. `Ok(None)` when neither source has credentials.
    pub fn resolve<F>(var: F) -> Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        match (
            non_empty("AWS_ACCESS_KEY_ID"),
            non_empty("AWS_SECRET_ACCESS_KEY"),
        ) {
            (Some(access_key_id), Some(secret_access_key)) => {
                return Ok(Some(Self {
                    access_key_id,
                    secret_access_key,
                    session_token: non_empty("AWS_SESSION_TOKEN"),
                }))
            }
            (None, None) => {}
            _ => {
                return Err(CacheError::Config(
                    "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together".to_string(),
                ))
            }
        }

        let explicit_file = non_empty("AWS_SHARED_CREDENTIALS_FILE").map(PathBuf::from);
        let explicit_profile = non_empty("AWS_PROFILE");

        let path = match explicit_file.clone().or_else(|| {
            non_empty("HOME")
                .or_else(|| non_empty("USERPROFILE"))
                .map(|home| PathBuf::from(home).join(".aws").join("credentials"))
        }) {
            Some(path) => path,
            None => return Ok(None),
        };

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && explicit_file.is_none() => {
                return Ok(None)
            }
            Err(e) => {
                return Err(CacheError::Config(format!(
                    "cannot read AWS credentials file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let profile = explicit_profile.as_deref().unwrap_or(DEFAULT_PROFILE);
        match Self::from_profile(&contents, profile) {
            Some(credentials) => Ok(Some(credentials)),
            None if explicit_profile.is_some() => Err(CacheError::Config(format!(
                "AWS profile {:?} has no key pair in {}",
                profile,
                path.display()
            ))),
            None => Ok(None),
        }
    }

    /// Read the key pair of `profile` from shared credentials file contents
    pub fn from_profile(contents: &str, profile: &str) -> Option<Self> {
        let mut in_profile = false;
        let mut access_key_id = None;
        let mut secret_access_key = None;
        let mut session_token = None;

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                in_profile = section.trim() == profile;
                continue;
            }
            if !in_profile {
                continue;
            }
            let Some((name, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().to_string();
            match name.trim().to_ascii_lowercase().as_str() {
                "aws_access_key_id" => access_key_id = Some(value),
                "aws_secret_access_key" => secret_access_key = Some(value),
                "aws_session_token" | "aws_security_token" => session_token = Some(value),
                _ => {}
            }
        }

        Some(Self {
            access_key_id: access_key_id.filter(|v| !v.is_empty())?,
            secret_access_key: secret_access_key.filter(|v| !v.is_empty())?,
            session_token: session_token.filter(|v| !v.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SHARED_FILE: &str = "\
# managed by aws configure
[default]
aws_access_key_id = AKIDDEFAULT
aws_secret_access_key = default-secret

[cache-writer]
aws_access_key_id=AKIDWRITER
aws_secret_access_key=writer-secret
aws_session_token=writer-token
";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn home_with_credentials(contents: &str) -> tempfile::TempDir {
        let home = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(home.path().join(".aws")).unwrap();
        std::fs::write(home.path().join(".aws").join("credentials"), contents).unwrap();
        home
    }

    #[test]
    fn test_from_profile() {
        let default = Credentials::from_profile(SHARED_FILE, "default").unwrap();
        assert_eq!(default.access_key_id, "AKIDDEFAULT");
        assert_eq!(default.secret_access_key, "default-secret");
        assert!(default.session_token.is_none());

        let writer = Credentials::from_profile(SHARED_FILE, "cache-writer").unwrap();
        assert_eq!(writer.access_key_id, "AKIDWRITER");
        assert_eq!(writer.session_token.as_deref(), Some("writer-token"));

        assert!(Credentials::from_profile(SHARED_FILE, "missing").is_none());
        assert!(Credentials::from_profile("[default]\naws_access_key_id = A\n", "default").is_none());
    }

    #[test]
    fn test_environment_wins() {
        let home = home_with_credentials(SHARED_FILE);
        let credentials = Credentials::resolve(lookup(&[
            ("AWS_ACCESS_KEY_ID", "AKIDENV"),
            ("AWS_SECRET_ACCESS_KEY", "env-secret"),
            ("AWS_SESSION_TOKEN", "env-token"),
            ("HOME", home.path().to_str().unwrap()),
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(credentials.access_key_id, "AKIDENV");
        assert_eq!(credentials.session_token.as_deref(), Some("env-token"));
    }

    #[test]
    fn test_half_environment_pair_is_error() {
        let result = Credentials::resolve(lookup(&[("AWS_SECRET_ACCESS_KEY", "secret")]));
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[test]
    fn test_shared_file_under_home() {
        let home = home_with_credentials(SHARED_FILE);
        let credentials = Credentials::resolve(lookup(&[("HOME", home.path().to_str().unwrap())]))
            .unwrap()
            .unwrap();

        assert_eq!(credentials.access_key_id, "AKIDDEFAULT");
        assert_eq!(credentials.secret_access_key, "default-secret");
    }

    #[test]
    fn test_named_profile_and_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds");
        std::fs::write(&path, SHARED_FILE).unwrap();

        let credentials = Credentials::resolve(lookup(&[
            ("AWS_SHARED_CREDENTIALS_FILE", path.to_str().unwrap()),
            ("AWS_PROFILE", "cache-writer"),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(credentials.access_key_id, "AKIDWRITER");
    }

    #[test]
    fn test_unknown_explicit_profile_is_error() {
        let home = home_with_credentials(SHARED_FILE);
        let result = Credentials::resolve(lookup(&[
            ("HOME", home.path().to_str().unwrap()),
            ("AWS_PROFILE", "nope"),
        ]));
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = Credentials::resolve(lookup(&[(
            "AWS_SHARED_CREDENTIALS_FILE",
            "/nonexistent/disks3cache/credentials",
        )]));
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[test]
    fn test_nothing_configured() {
        let home = tempfile::tempdir().unwrap();
        let result = Credentials::resolve(lookup(&[("HOME", home.path().to_str().unwrap())]));
        assert!(result.unwrap().is_none());
        assert!(Credentials::resolve(lookup(&[])).unwrap().is_none());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let credentials = Credentials::from_profile(SHARED_FILE, "cache-writer").unwrap();
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("AKIDWRITER"));
        assert!(!debug.contains("writer-secret"));
        assert!(!debug.contains("writer-token"));
    }
}
