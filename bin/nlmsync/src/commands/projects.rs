use std::sync::Arc;

use nlmsync_core::types::Project;
use nlmsync_engine::AutoSkipPrompt;
use nlmsync_zotero::ZoteroClient;

use super::build_engine;

pub async fn list() -> anyhow::Result<()> {
    let (engine, _, _) = build_engine(Arc::new(AutoSkipPrompt))?;
    let projects = engine.list_projects().await?;
    if projects.is_empty() {
        println!("No projects configured. Add one with `nlmsync projects add <name>`.");
        return Ok(());
    }
    for p in projects {
        let mut filters = Vec::new();
        if let Some(tag) = &p.tag {
            filters.push(format!("tag={tag}"));
        }
        if let Some(name) = &p.collection_name {
            filters.push(format!("collection={name}"));
        } else if let Some(id) = p.collection_id {
            filters.push(format!("collection#{id}"));
        }
        if let Some(name) = &p.library_name {
            filters.push(format!("library={name}"));
        }
        let notebook = p
            .notebook_name
            .or(p.notebook_id)
            .unwrap_or_else(|| "(open tab)".to_string());
        let filters = if filters.is_empty() {
            "no filters".to_string()
        } else {
            filters.join(", ")
        };
        println!("{}  ->  {}  [{}]", p.name, notebook, filters);
    }
    Ok(())
}

pub async fn add(
    name: String,
    tag: Option<String>,
    library: Option<i64>,
    collection: Option<i64>,
    notebook: Option<String>,
    notebook_name: Option<String>,
) -> anyhow::Result<()> {
    let (engine, config, _) = build_engine(Arc::new(AutoSkipPrompt))?;

    let mut project = Project::new(&name);
    project.tag = tag.filter(|t| !t.is_empty());
    project.library_id = library;
    project.collection_id = collection;
    project.notebook_id = notebook;
    project.notebook_name = notebook_name;

    // Resolve display names while Zotero is reachable; ids are what the
    // sync actually uses.
    let zotero = ZoteroClient::new(&config.zotero.host);
    if let Some(library_id) = project.library_id {
        if let Ok(libraries) = zotero.libraries().await {
            project.library_name = libraries
                .iter()
                .find(|l| l.library_id == library_id)
                .map(|l| l.name.clone());
        }
        if let Some(collection_id) = project.collection_id {
            if let Ok(collections) = zotero.collections(Some(library_id)).await {
                project.collection_name = collections
                    .iter()
                    .find(|c| c.id == collection_id)
                    .map(|c| c.name.clone());
            }
        }
    }

    engine.add_project(project).await?;
    println!("Project \"{name}\" added.");
    Ok(())
}

pub async fn remove(name: &str) -> anyhow::Result<()> {
    let (engine, _, _) = build_engine(Arc::new(AutoSkipPrompt))?;
    let removed = engine.remove_project(name).await?;
    println!("Project \"{}\" removed.", removed.name);
    Ok(())
}
