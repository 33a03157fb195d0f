//! The candidate-file source the orchestrator pulls from.

use async_trait::async_trait;
use nlmsync_core::types::{FileCandidate, Project};
use nlmsync_core::Result;
use nlmsync_zotero::{FetchedFile, ListFilter, ZoteroClient};

#[async_trait]
pub trait FileSource: Send + Sync {
    async fn list(&self, filter: &ListFilter) -> Result<Vec<FileCandidate>>;
    async fn fetch(&self, id: i64) -> Result<FetchedFile>;
}

#[async_trait]
impl FileSource for ZoteroClient {
    async fn list(&self, filter: &ListFilter) -> Result<Vec<FileCandidate>> {
        self.list_files(filter).await
    }

    async fn fetch(&self, id: i64) -> Result<FetchedFile> {
        self.fetch_file(id).await
    }
}

pub fn filter_for(project: &Project) -> ListFilter {
    ListFilter {
        tag: project.tag.clone(),
        collection_id: project.collection_id,
        collection_name: project.collection_name.clone(),
        library_id: project.library_id,
    }
}
