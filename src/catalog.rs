use crate::gitlab::{self, ApiError, GitlabClient};
use crate::project::Project;

/// One group's projects plus per-project selection state. A fresh `load`
/// builds a fresh catalog; catalogs are never merged across fetches.
pub struct Catalog {
    entries: Vec<Project>,
}

impl Catalog {
    pub fn new(entries: Vec<Project>) -> Self {
        Self { entries }
    }

    /// Every page of the group's project list, with nothing selected yet.
    pub async fn load(client: &GitlabClient, group_id: u64) -> Result<Self, ApiError> {
        let entries = gitlab::fetch_group_projects(client, group_id).await?;
        log::info!(
            "loaded catalog: group_id={} projects={}",
            group_id,
            entries.len()
        );
        Ok(Self::new(entries))
    }

    /// Flips the entry with this clone URL. An unknown URL is a no-op.
    pub fn toggle_selection(&mut self, clone_url: &str) {
        if let Some(project) = self.entries.iter_mut().find(|p| p.clone_url == clone_url) {
            project.selected = !project.selected;
        }
    }

    pub fn select_all(&mut self) {
        for project in &mut self.entries {
            project.selected = true;
        }
    }

    /// Selected entries, in catalog order.
    pub fn selected(&self) -> Vec<Project> {
        self.entries
            .iter()
            .filter(|p| p.selected)
            .cloned()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Project> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
