//! Remote URL checks performed before cloning or setting a remote.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// Hosted remotes accepted over HTTPS or SSH.
static HOSTED_REMOTE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^https://github\.com/[\w.-]+/[\w.-]+(?:\.git)?$",
        r"^git@github\.com:[\w.-]+/[\w.-]+(?:\.git)?$",
        r"^https://gitlab\.com/[\w.-]+/[\w.-]+(?:\.git)?$",
        r"^git@gitlab\.com:[\w.-]+/[\w.-]+(?:\.git)?$",
        r"^https://bitbucket\.org/[\w.-]+/[\w.-]+(?:\.git)?$",
        r"^git@bitbucket\.org:[\w.-]+/[\w.-]+(?:\.git)?$",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// True for GitHub, GitLab and Bitbucket HTTPS/SSH remotes.
pub fn is_hosted_remote(url: &str) -> bool {
    HOSTED_REMOTE_PATTERNS.iter().any(|re| re.is_match(url))
}

/// Filesystem path named by a `file://` URL or an absolute local path.
///
/// The caller still has to check the path against the sandbox.
pub fn local_remote_path(url: &str) -> Option<&Path> {
    let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
    path.is_absolute().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(HOSTED_REMOTE_PATTERNS.len(), 6);
    }

    #[test]
    fn test_hosted_remotes() {
        assert!(is_hosted_remote("https://github.com/rust-lang/rust.git"));
        assert!(is_hosted_remote("https://github.com/rust-lang/rust"));
        assert!(is_hosted_remote("git@gitlab.com:group/project.git"));
        assert!(is_hosted_remote("https://bitbucket.org/team/repo"));
    }

    #[test]
    fn test_rejected_remotes() {
        assert!(!is_hosted_remote("https://example.com/a/b.git"));
        assert!(!is_hosted_remote("https://github.com/only-owner"));
        assert!(!is_hosted_remote("https://github.com/a/b; rm -rf /"));
        assert!(local_remote_path("relative/path").is_none());
    }

    #[test]
    fn test_local_remote_paths() {
        assert_eq!(local_remote_path("/srv/repo"), Some(Path::new("/srv/repo")));
        assert_eq!(local_remote_path("file:///srv/repo"), Some(Path::new("/srv/repo")));
        assert!(local_remote_path("file://srv/repo").is_none());
        assert!(local_remote_path("https://example.com/a/b.git").is_none());
    }
}
