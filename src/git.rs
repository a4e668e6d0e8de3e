use std::path::{Path, PathBuf};
use std::process::Command as ProcessCommand;

use chrono::Local;
use tracing::{debug, info};

use crate::error::PersistenceError;

/// A git checkout whose `origin` carries the shared sources directory.
#[derive(Debug, Clone)]
pub struct GitRemote {
    repo_dir: PathBuf,
    git_bin: PathBuf,
}

impl GitRemote {
    pub fn new(repo_dir: &Path) -> Self {
        Self {
            repo_dir: repo_dir.to_path_buf(),
            git_bin: PathBuf::from("git"),
        }
    }

    pub fn pull(&self) -> Result<(), PersistenceError> {
        self.run(&["pull", "--ff-only"])?;
        info!(repo = %self.repo_dir.display(), "pulled sources");
        Ok(())
    }

    /// Stages `file`, commits it with a timestamped message when it changed,
    /// then pushes.
    pub fn commit_and_push(&self, file: &Path) -> Result<(), PersistenceError> {
        let relative = file.strip_prefix(&self.repo_dir).unwrap_or(file);
        let relative = relative.to_string_lossy();
        self.run(&["add", "--", relative.as_ref()])?;

        // An unchanged file still pushes: an earlier commit may not have
        // reached the remote yet.
        if self.run(&["diff", "--cached", "--quiet"]).is_ok() {
            debug!("listen times unchanged; pushing pending commits only");
        } else {
            let message = commit_message(&Local::now());
            self.run(&["commit", "-m", &message])?;
            info!(%message, "committed listen times");
        }
        self.run(&["push"])?;
        info!(repo = %self.repo_dir.display(), "pushed listen times");
        Ok(())
    }

    fn run(&self, args: &[&str]) -> Result<String, PersistenceError> {
        let command = args.first().copied().unwrap_or_default().to_string();
        let output = ProcessCommand::new(&self.git_bin)
            .arg("-C")
            .arg(&self.repo_dir)
            .args(args)
            .output()
            .map_err(|err| PersistenceError::Git {
                command: command.clone(),
                detail: format!("failed to launch {}: {err}", self.git_bin.display()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = match stderr.trim() {
                "" => format!("exited with {}", output.status),
                trimmed => trimmed.to_string(),
            };
            return Err(PersistenceError::Git { command, detail });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

pub(crate) fn commit_message<Tz>(now: &chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("Update listen times {}", now.format("%d/%m/%Y %H_%M_%S"))
}


#[cfg(test)]
mod tests {
    use super::fixture::{RepoPair, git};
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn commit_message_uses_day_first_timestamp() {
        let now = Utc
            .with_ymd_and_hms(2024, 3, 7, 9, 5, 2)
            .single()
            .expect("valid timestamp");
        assert_eq!(
            commit_message(&now),
            "Update listen times 07/03/2024 09_05_02"
        );
    }

    #[test]
    fn failing_git_command_is_surfaced() {
        let dir = tempfile::tempdir().expect("tempdir");
        let remote = GitRemote {
            repo_dir: dir.path().to_path_buf(),
            git_bin: PathBuf::from("termcast-no-such-git"),
        };

        let err = remote.pull().expect_err("missing binary must fail");
        assert!(
            matches!(&err, PersistenceError::Git { command, .. } if command == "pull"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn changed_file_is_committed_and_pushed() {
        let repos = RepoPair::new();
        let file = repos.work.join("listen_time.json");
        std::fs::write(&file, "{}").expect("write file");

        GitRemote::new(&repos.work)
            .commit_and_push(&file)
            .expect("commit and push");

        assert_eq!(repos.remote_head(), repos.work_head());
        let subject = git(&repos.work, &["log", "-1", "--format=%s"]);
        assert!(subject.starts_with("Update listen times "), "{subject}");
    }

    #[test]
    fn unchanged_file_still_pushes_pending_commits() {
        let repos = RepoPair::new();
        let file = repos.work.join("listen_time.json");
        std::fs::write(&file, "{}").expect("write file");
        // A commit that never reached the remote, as after an offline save.
        git(&repos.work, &["add", "listen_time.json"]);
        git(&repos.work, &["commit", "-q", "-m", "offline save"]);
        assert_ne!(repos.remote_head(), repos.work_head());

        GitRemote::new(&repos.work)
            .commit_and_push(&file)
            .expect("push pending commit");

        assert_eq!(repos.remote_head(), repos.work_head());
        assert_eq!(
            git(&repos.work, &["log", "-1", "--format=%s"]),
            "offline save"
        );
    }

    #[test]
    fn rejected_push_is_surfaced() {
        let repos = RepoPair::new();
        git(&repos.work, &["remote", "remove", "origin"]);
        let file = repos.work.join("listen_time.json");
        std::fs::write(&file, "{}").expect("write file");

        let err = GitRemote::new(&repos.work)
            .commit_and_push(&file)
            .expect_err("push without a remote fails");
        assert!(
            matches!(&err, PersistenceError::Git { command, .. } if command == "push"),
            "unexpected error: {err}"
        );
    }
}
