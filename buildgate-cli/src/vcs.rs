use buildgate_core::VersionControl;
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to run git {args}: {source}")]
    Spawn {
        args: String,
        #[source]
        source: std::io::Error,
    },
    #[error("git {args} exited with {code:?}: {stderr}")]
    Failed {
        args: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Shells out to the `git` binary inside `repo`.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo: PathBuf,
}

impl GitCli {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    fn git(&self, args: &[&str]) -> Result<(), GitError> {
        let joined = args.join(" ");
        log::debug!("git {joined} (in {})", self.repo.display());
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo)
            .output()
            .map_err(|source| GitError::Spawn {
                args: joined.clone(),
                source,
            })?;
        if output.status.success() {
            Ok(())
        } else {
            Err(GitError::Failed {
                args: joined,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl VersionControl for GitCli {
    type Error = GitError;

    fn commit(&self, message: &str) -> Result<(), Self::Error> {
        self.git(&["add", "."])?;
        self.git(&["commit", "-m", message])
    }

    fn tag(&self, name: &str) -> Result<(), Self::Error> {
        self.git(&["tag", name])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_repo_directory_fails_to_spawn() {
        let git = GitCli::new(std::env::temp_dir().join("buildgate-no-such-repo-dir"));
        let err = git.tag("v1").unwrap_err();
        assert!(matches!(err, GitError::Spawn { .. }));
        assert!(err.to_string().contains("git tag v1"));
    }
}
