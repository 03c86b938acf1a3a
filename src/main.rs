use anyhow::{bail, Context, Result};
use clap::Parser;
use console::style;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

mod catalog;
mod git;
mod gitlab;
mod project;

use catalog::Catalog;
use git::CloneOptions;
use gitlab::GitlabClient;
use project::{CloneOutcome, ProgressSink};

#[derive(Debug, Parser)]
#[clap(
    name = "gitlab-cloner",
    version,
    about = "Clone the projects of a GitLab group"
)]
struct Opts {
    /// Group to look up, by name.
    group: String,

    /// Access token; falls back to $GITLAB_TOKEN. Anonymous when absent.
    #[clap(short, long)]
    token: Option<String>,

    /// Base URL of the GitLab instance.
    #[clap(short, long, default_value = "https://gitlab.com")]
    url: String,

    /// Directory to clone into, created on demand. A leading ~ is expanded.
    #[clap(short, long, default_value = ".")]
    directory: String,

    /// Only list the group's projects, do not clone anything.
    #[clap(short, long)]
    list: bool,

    /// Project to clone, by name or clone URL; repeatable. Without it,
    /// every project of the group is cloned.
    #[clap(short, long)]
    select: Vec<String>,

    /// How many clone processes may run at once.
    #[clap(short, long, default_value = "1")]
    jobs: usize,

    /// Debug-level logging.
    #[clap(short, long)]
    verbose: bool,
}

struct ConsoleReporter {
    total: usize,
    completed: usize,
}

impl ConsoleReporter {
    fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
        }
    }
}

impl ProgressSink for ConsoleReporter {
    fn on_progress(&mut self, _fraction: f64, outcome: &CloneOutcome) {
        self.completed += 1;
        let counter = style(format!("[{}/{}]", self.completed, self.total)).dim();
        if outcome.succeeded {
            println!(
                "{} {} {}",
                counter,
                style("✓").green(),
                outcome.project.name
            );
        } else {
            println!(
                "{} {} {}: {}",
                counter,
                style("✗").red(),
                outcome.project.name,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

// A selector picks projects by display name or by clone URL. Names are not
// unique across subgroups, so one name may hit several entries.
fn apply_selection(catalog: &mut Catalog, selectors: &[String]) {
    for selector in selectors {
        let matches: Vec<String> = catalog
            .iter()
            .filter(|p| &p.name == selector || &p.clone_url == selector)
            .map(|p| p.clone_url.clone())
            .collect();
        if matches.is_empty() {
            log::warn!("no project matching selector: {}", selector);
        } else if matches.len() > 1 {
            log::warn!(
                "selector matches several projects: selector={} count={}",
                selector,
                matches.len()
            );
        }
        for clone_url in &matches {
            catalog.toggle_selection(clone_url);
        }
    }
}

// `~` and `~/…` expansion for the destination option.
fn expand_path(raw: &str) -> PathBuf {
    if let Some(stripped) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    } else if raw == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(raw)
}

#[tokio::main]
async fn main() -> Result<()> {
    let opts = Opts::parse();
    let default_filter = if opts.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let token = opts
        .token
        .clone()
        .or_else(|| std::env::var("GITLAB_TOKEN").ok());
    if token.is_none() {
        log::warn!("no access token given: only public groups are visible");
    }
    let client = GitlabClient::new(&opts.url, token.as_deref())?;

    let group = gitlab::resolve_group(&client, &opts.group)
        .await
        .with_context(|| format!("Failed to resolve group '{}'", opts.group))?;
    log::info!("resolved group: name={} id={}", group.name, group.id);

    let mut catalog = Catalog::load(&client, group.id)
        .await
        .with_context(|| format!("Failed to list projects of group '{}'", group.name))?;
    if catalog.is_empty() {
        println!("Group '{}' has no projects.", group.name);
        return Ok(());
    }

    if opts.list {
        for project in catalog.iter() {
            println!(
                "{} {}",
                style(format!("{:<40}", project.name)).bold(),
                project.clone_url
            );
        }
        return Ok(());
    }

    if opts.select.is_empty() {
        catalog.select_all();
    } else {
        apply_selection(&mut catalog, &opts.select);
    }
    let selected = catalog.selected();
    if selected.is_empty() {
        println!("Nothing selected, nothing to clone.");
        return Ok(());
    }

    let dest_dir = expand_path(&opts.directory);
    std::fs::create_dir_all(&dest_dir).with_context(|| {
        format!(
            "Failed to create destination directory {}",
            dest_dir.display()
        )
    })?;

    let clone_opts = CloneOptions {
        jobs: opts.jobs,
        ..Default::default()
    };
    {
        let cancel = Arc::clone(&clone_opts.cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("interrupt: letting running clones finish, dropping the rest");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    println!(
        "Cloning {} of {} projects from '{}' into {}",
        selected.len(),
        catalog.len(),
        group.name,
        dest_dir.display()
    );
    let total = selected.len();
    let mut reporter = ConsoleReporter::new(total);
    let outcomes = git::clone_projects(selected, &dest_dir, &clone_opts, &mut reporter).await?;

    let failed = outcomes.iter().filter(|o| !o.succeeded).count();
    let succeeded = outcomes.len() - failed;
    let skipped = total - outcomes.len();
    if skipped > 0 {
        println!(
            "{} {} cloned, {} failed, {} skipped after interrupt",
            style("done:").bold(),
            succeeded,
            failed,
            skipped
        );
    } else {
        println!(
            "{} {} cloned, {} failed",
            style("done:").bold(),
            succeeded,
            failed
        );
    }
    if failed > 0 {
        bail!("{} of {} clones failed", failed, outcomes.len());
    }
    Ok(())
}
