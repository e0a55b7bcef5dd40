use crate::error::{CommonError, CommonResult};
use crate::store::{normalize_path, VirtualFileStore};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// Persistent project storage, consulted when assembling a preview request
pub trait ProjectStore: Send + Sync {
    /// Current files of a project
    fn get_files(&self, project_id: &str) -> CommonResult<VirtualFileStore>;

    /// Create or overwrite one file, creating the project when needed
    fn put_file(&self, project_id: &str, path: &str, content: &str) -> CommonResult<()>;

    /// Remove one file; returns whether it existed
    fn delete_file(&self, project_id: &str, path: &str) -> CommonResult<bool>;
}

/// In-memory project store
#[derive(Debug, Default)]
pub struct MemoryProjectStore {
    projects: RwLock<HashMap<String, BTreeMap<String, String>>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> CommonError {
    CommonError::Generic("project store lock poisoned".to_string())
}

impl ProjectStore for MemoryProjectStore {
    fn get_files(&self, project_id: &str) -> CommonResult<VirtualFileStore> {
        let projects = self.projects.read().map_err(|_| poisoned())?;
        projects
            .get(project_id)
            .map(|files| VirtualFileStore::new(files.iter()))
            .ok_or_else(|| CommonError::ProjectNotFound(project_id.to_string()))
    }

    fn put_file(&self, project_id: &str, path: &str, content: &str) -> CommonResult<()> {
        let mut projects = self.projects.write().map_err(|_| poisoned())?;
        projects
            .entry(project_id.to_string())
            .or_default()
            .insert(normalize_path(path), content.to_string());
        Ok(())
    }

    fn delete_file(&self, project_id: &str, path: &str) -> CommonResult<bool> {
        let mut projects = self.projects.write().map_err(|_| poisoned())?;
        let files = projects
            .get_mut(project_id)
            .ok_or_else(|| CommonError::ProjectNotFound(project_id.to_string()))?;
        Ok(files.remove(&normalize_path(path)).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_delete() {
        let store = MemoryProjectStore::new();
        store.put_file("p1", "src/App.tsx", "export default () => null").unwrap();
        store.put_file("p1", "/src/main.tsx", "import App from './App'").unwrap();

        let files = store.get_files("p1").unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.contains("src/main.tsx"));

        assert!(store.delete_file("p1", "src/App.tsx").unwrap());
        assert!(!store.delete_file("p1", "src/App.tsx").unwrap());
        assert_eq!(store.get_files("p1").unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_project() {
        let store = MemoryProjectStore::new();
        assert!(matches!(
            store.get_files("missing"),
            Err(CommonError::ProjectNotFound(_))
        ));
    }
}
