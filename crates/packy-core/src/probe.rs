use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::config::ToolsConfig;
use crate::error::{PackyError, Result};
use crate::io;
use crate::process::{run_command, TimeoutHook};
use crate::types::ActionType;

const LOCK_CONTENTION: &str = "unable to lock database";
const HEADER_MARKER: &str = "Package basename";

/// Asks the checkupdates tool which packages are ready for an action.
#[derive(Debug, Clone)]
pub struct UpdateProber {
    program: String,
    move_args: Vec<String>,
    update_args: Vec<String>,
    timeout: Duration,
    lock_dir: Option<PathBuf>,
}

impl UpdateProber {
    pub fn from_config(tools: &ToolsConfig) -> Self {
        let lock_dir = match tools.lock_dir() {
            Ok(dir) => Some(dir),
            Err(e) => {
                warn!(error = %e, "no lock directory; stale probe locks will not be cleaned");
                None
            }
        };
        Self {
            program: tools.probe.clone(),
            move_args: tools.move_args.clone(),
            update_args: tools.update_args.clone(),
            timeout: tools.timeout(),
            lock_dir,
        }
    }

    pub fn args_for(&self, action: ActionType) -> &[String] {
        match action {
            ActionType::Move => &self.move_args,
            ActionType::Update => &self.update_args,
        }
    }

    /// Run the probe for `action` and return the candidate package names in
    /// report order.
    ///
    /// Any stderr output fails the probe even on a zero exit code.
    pub async fn probe(&self, action: ActionType) -> Result<Vec<String>> {
        let outcome = run_command(
            &self.program,
            self.args_for(action),
            self.timeout,
            self.cleanup_hook(),
        )
        .await?;

        if outcome.timed_out {
            return Err(PackyError::ToolTimedOut {
                program: self.program.clone(),
                secs: self.timeout.as_secs(),
            });
        }
        let stderr = outcome.stderr.trim();
        if !stderr.is_empty() {
            if stderr.contains(LOCK_CONTENTION) {
                self.clean_lock_dir();
            }
            return Err(PackyError::ToolStderr {
                program: self.program.clone(),
                stderr: stderr.to_string(),
            });
        }
        if !outcome.succeeded() {
            return Err(PackyError::ToolFailed {
                program: self.program.clone(),
                status: outcome.status_label(),
            });
        }
        Ok(parse_report(&outcome.stdout))
    }

    fn cleanup_hook(&self) -> Option<TimeoutHook> {
        let dir = self.lock_dir.clone()?;
        Some(Box::new(move || remove_lock_dir(&dir)))
    }

    fn clean_lock_dir(&self) {
        if let Some(dir) = &self.lock_dir {
            remove_lock_dir(dir);
        }
    }
}

fn remove_lock_dir(dir: &Path) {
    match io::remove_dir_if_exists(dir) {
        Ok(true) => info!(path = %dir.display(), "removed checkupdates lock cache"),
        Ok(false) => {}
        Err(e) => warn!(path = %dir.display(), error = %e, "failed to remove lock cache"),
    }
}

/// Extract package names from a checkupdates table.
///
/// The first whitespace-separated token of each line is the package. Blank
/// lines, the header row and ruler rows are skipped.
pub fn parse_report(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| {
            let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
            if collapsed.is_empty() || collapsed.contains(HEADER_MARKER) {
                return None;
            }
            let first = collapsed.split(' ').next()?;
            if !first.chars().any(char::is_alphanumeric) {
                return None;
            }
            Some(first.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const REPORT: &str = "\
Package basename    | Repo from         | Repo to      | Version
----------------------------------------------------------------
  python-foo        | world-gremlins    | world        | 1.2-1

perl-bar   |   world-gremlins   | world   |  0.3-2
-------------
zstd    | system-goblins | system | 1.5.6-1
";

    #[test]
    fn parse_report_takes_first_column() {
        assert_eq!(
            parse_report(REPORT),
            vec![
                "python-foo".to_string(),
                "perl-bar".to_string(),
                "zstd".to_string()
            ]
        );
    }

    #[test]
    fn parse_report_of_empty_output_is_empty() {
        assert!(parse_report("").is_empty());
        assert!(parse_report("\n   \n").is_empty());
    }

    /// Script run through `sh` so tests never exec a freshly written file.
    fn fake_tool(dir: &TempDir, body: &str) -> String {
        let path = dir.path().join("checkupdates.sh");
        std::fs::write(&path, format!("{body}\n")).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn prober(script: String, lock_dir: PathBuf, timeout_secs: u64) -> UpdateProber {
        let tools = ToolsConfig {
            probe: "sh".to_string(),
            move_args: vec![script.clone(), "-m".to_string()],
            update_args: vec![script, "-u".to_string()],
            timeout_secs,
            lock_dir: Some(lock_dir),
            ..ToolsConfig::default()
        };
        UpdateProber::from_config(&tools)
    }

    #[tokio::test]
    async fn probe_passes_action_flag() {
        let dir = TempDir::new().unwrap();
        let tool = fake_tool(
            &dir,
            r#"if [ "$1" = "-m" ]; then echo "moved-pkg | a | b"; else echo "updated-pkg | a | b"; fi"#,
        );
        let p = prober(tool, dir.path().join("lock"), 5);
        assert_eq!(p.probe(ActionType::Move).await.unwrap(), vec!["moved-pkg"]);
        assert_eq!(
            p.probe(ActionType::Update).await.unwrap(),
            vec!["updated-pkg"]
        );
    }

    #[tokio::test]
    async fn stderr_fails_probe_and_lock_contention_cleans_cache() {
        let dir = TempDir::new().unwrap();
        let lock = dir.path().join("lock");
        std::fs::create_dir_all(lock.join("db")).unwrap();
        let tool = fake_tool(
            &dir,
            "echo foo; echo 'error: unable to lock database' >&2; exit 0",
        );
        let err = prober(tool, lock.clone(), 5)
            .probe(ActionType::Move)
            .await
            .unwrap_err();
        assert!(matches!(err, PackyError::ToolStderr { .. }), "{err}");
        assert!(!lock.exists());
    }

    #[tokio::test]
    async fn other_stderr_keeps_cache() {
        let dir = TempDir::new().unwrap();
        let lock = dir.path().join("lock");
        std::fs::create_dir_all(&lock).unwrap();
        let tool = fake_tool(&dir, "echo 'warning: something' >&2");
        assert!(prober(tool, lock.clone(), 5)
            .probe(ActionType::Update)
            .await
            .is_err());
        assert!(lock.exists());
    }

    #[tokio::test]
    async fn nonzero_exit_fails_probe() {
        let dir = TempDir::new().unwrap();
        let tool = fake_tool(&dir, "echo foo; exit 2");
        let err = prober(tool, dir.path().join("lock"), 5)
            .probe(ActionType::Move)
            .await
            .unwrap_err();
        assert!(matches!(err, PackyError::ToolFailed { .. }), "{err}");
    }

    #[tokio::test]
    async fn timeout_removes_lock_cache() {
        let dir = TempDir::new().unwrap();
        let lock = dir.path().join("lock");
        std::fs::create_dir_all(&lock).unwrap();
        let tool = fake_tool(&dir, "exec sleep 5");
        let mut p = prober(tool, lock.clone(), 5);
        p.timeout = Duration::from_millis(150);
        let err = p.probe(ActionType::Move).await.unwrap_err();
        assert!(matches!(err, PackyError::ToolTimedOut { .. }), "{err}");
        assert!(!lock.exists());
    }
}
