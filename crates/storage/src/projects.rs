use nlmsync_core::types::Project;
use nlmsync_core::{Error, Paths, Result};
use uuid::Uuid;

/// Ordered project list, persisted as a whole on every mutation.
pub struct ProjectStore {
    paths: Paths,
}

impl ProjectStore {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    pub async fn load(&self) -> Result<Vec<Project>> {
        let path = self.paths.projects_file();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&path).await?;
        let projects: Vec<Project> = serde_json::from_str(&content)?;
        Ok(projects)
    }

    pub async fn save(&self, projects: &[Project]) -> Result<()> {
        let path = self.paths.projects_file();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(projects)?;
        tokio::fs::write(&path, content).await?;
        Ok(())
    }

    pub async fn add(&self, project: Project) -> Result<()> {
        let mut projects = self.load().await?;
        projects.push(project);
        self.save(&projects).await
    }

    pub async fn remove(&self, id: Uuid) -> Result<Project> {
        let mut projects = self.load().await?;
        let pos = projects
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| Error::Storage(format!("No project with id {id}")))?;
        let removed = projects.remove(pos);
        self.save(&projects).await?;
        Ok(removed)
    }

    /// Find by exact name, then by name prefix (unique match required).
    pub async fn find_by_name(&self, name: &str) -> Result<Project> {
        let projects = self.load().await?;
        if let Some(p) = projects.iter().find(|p| p.name == name) {
            return Ok(p.clone());
        }
        let matches: Vec<&Project> = projects
            .iter()
            .filter(|p| p.name.to_lowercase().starts_with(&name.to_lowercase()))
            .collect();
        match matches.len() {
            0 => Err(Error::Storage(format!("No project named '{name}'"))),
            1 => Ok(matches[0].clone()),
            _ => {
                let names: Vec<&str> = matches.iter().map(|p| p.name.as_str()).collect();
                Err(Error::Storage(format!(
                    "Multiple projects match '{}': {}",
                    name,
                    names.join(", ")
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (ProjectStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path().to_path_buf());
        (ProjectStore::new(paths), dir)
    }

    #[tokio::test]
    async fn test_add_and_load_preserves_order() {
        let (store, _dir) = store();
        store.add(Project::new("alpha")).await.unwrap();
        store.add(Project::new("beta")).await.unwrap();
        let projects = store.load().await.unwrap();
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].name, "alpha");
        assert_eq!(projects[1].name, "beta");
    }

    #[tokio::test]
    async fn test_remove_by_id() {
        let (store, _dir) = store();
        let p = Project::new("alpha");
        let id = p.id;
        store.add(p).await.unwrap();
        let removed = store.remove(id).await.unwrap();
        assert_eq!(removed.name, "alpha");
        assert!(store.load().await.unwrap().is_empty());
        assert!(store.remove(id).await.is_err());
    }

    #[tokio::test]
    async fn test_find_by_name_prefix() {
        let (store, _dir) = store();
        store.add(Project::new("Thesis sources")).await.unwrap();
        store.add(Project::new("Teaching notes")).await.unwrap();

        assert_eq!(
            store.find_by_name("thesis").await.unwrap().name,
            "Thesis sources"
        );
        // Ambiguous prefix.
        assert!(store.find_by_name("t").await.is_err());
        assert!(store.find_by_name("missing").await.is_err());
    }
}
