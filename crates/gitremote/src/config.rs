//! Session configuration.

use std::path::PathBuf;

/// Immutable configuration shared by every command of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// The local repository's git directory (`GIT_DIR`).
    pub dir: PathBuf,
    /// Name of the remote git invoked the helper for.
    pub remote: String,
    /// URL of the remote.
    pub url: String,
}

impl Config {
    /// Creates a configuration from the helper's command-line arguments.
    ///
    /// git passes the URL as a second argument only when the remote was named
    /// on the command line by URL; otherwise the remote name doubles as the URL.
    pub fn new(remote: impl Into<String>, url: Option<String>) -> Self {
        let remote = remote.into();
        let url = url.unwrap_or_else(|| remote.clone());
        Self {
            dir: PathBuf::new(),
            remote,
            url,
        }
    }

    /// Sets the git directory.
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_defaults_to_remote() {
        let config = Config::new("local::/srv/repo.git", None);
        assert_eq!(config.remote, "local::/srv/repo.git");
        assert_eq!(config.url, "local::/srv/repo.git");
    }

    #[test]
    fn test_explicit_url() {
        let config = Config::new("origin", Some("/srv/repo.git".to_string())).with_dir(".git");
        assert_eq!(config.remote, "origin");
        assert_eq!(config.url, "/srv/repo.git");
        assert_eq!(config.dir, PathBuf::from(".git"));
    }
}
