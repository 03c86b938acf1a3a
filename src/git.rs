use crate::project::{CloneOutcome, ProgressSink, Project};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::{mpsc, Semaphore};

/// `program` is the executable to invoke, `git` unless a test substitutes a
/// stub. `cancel` is checked between dispatches, never mid-process.
pub struct CloneOptions {
    pub program: PathBuf,
    pub jobs: usize,
    pub cancel: Arc<AtomicBool>,
}

impl Default for CloneOptions {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
            jobs: 1,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Directory name a clone URL lands in: the final `/` segment with a
/// trailing `.git` stripped, so `git@gitlab.com:group/proj.git` becomes
/// `proj`.
pub fn target_dir_name(clone_url: &str) -> &str {
    let last = clone_url.rsplit('/').next().unwrap_or(clone_url);
    last.strip_suffix(".git").unwrap_or(last)
}

/// Clones every given project under `dest_dir`, at most `opts.jobs` child
/// processes at a time. Each attempt yields exactly one [`CloneOutcome`],
/// handed to `sink` together with the completed fraction; a failing clone
/// never aborts the rest of the batch. Outcomes come back in completion
/// order, which matches the input order only while `jobs` is 1.
pub async fn clone_projects(
    projects: Vec<Project>,
    dest_dir: &Path,
    opts: &CloneOptions,
    sink: &mut dyn ProgressSink,
) -> Result<Vec<CloneOutcome>> {
    if projects.is_empty() {
        return Ok(Vec::new());
    }
    let total = projects.len();

    let (tx_outcomes, mut rx_outcomes) = mpsc::unbounded_channel();
    let semaphore = Arc::new(Semaphore::new(opts.jobs.max(1)));
    let program = opts.program.clone();
    let dest_dir = dest_dir.to_path_buf();
    let cancel = Arc::clone(&opts.cancel);

    let dispatcher = tokio::spawn(async move {
        for project in projects {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            if cancel.load(Ordering::Relaxed) {
                log::info!("cancellation requested: dropping the remaining clone queue");
                break;
            }

            let tx_outcomes = tx_outcomes.clone();
            let program = program.clone();
            let target = dest_dir.join(target_dir_name(&project.clone_url));
            tokio::spawn(async move {
                let outcome = clone_one(&program, project, &target).await;
                let _ = tx_outcomes.send(outcome);
                drop(permit);
            });
        }
    });

    let mut outcomes = Vec::with_capacity(total);
    let mut completed = 0usize;
    while let Some(outcome) = rx_outcomes.recv().await {
        completed += 1;
        let fraction = completed as f64 / total as f64;
        sink.on_progress(fraction, &outcome);
        outcomes.push(outcome);
    }
    dispatcher.await.context("Failed to dispatch clone jobs")?;

    Ok(outcomes)
}

async fn clone_one(program: &Path, project: Project, target: &Path) -> CloneOutcome {
    log::debug!(
        "cloning: url={} target={}",
        project.clone_url,
        target.display()
    );
    let output = Command::new(program)
        .arg("clone")
        .arg(&project.clone_url)
        .arg(target)
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => {
            log::info!("cloned: name={} url={}", project.name, project.clone_url);
            CloneOutcome {
                project,
                succeeded: true,
                error: None,
            }
        }
        Ok(out) => {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let detail = match stderr.trim().lines().last() {
                Some(line) => format!("{} ({})", out.status, line.trim()),
                None => out.status.to_string(),
            };
            log::error!("clone failed: url={} err={}", project.clone_url, detail);
            CloneOutcome {
                project,
                succeeded: false,
                error: Some(detail),
            }
        }
        Err(err) => {
            let detail = format!("could not run {}: {}", program.display(), err);
            log::error!("clone failed: url={} err={}", project.clone_url, detail);
            CloneOutcome {
                project,
                succeeded: false,
                error: Some(detail),
            }
        }
    }
}
