use crate::error::ApiError;
use candidature_store::error::Result as StoreResult;
use candidature_store::Store;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Database {
    path: Arc<PathBuf>,
}

impl Database {
    pub fn open(path: PathBuf) -> StoreResult<Self> {
        let store = Store::open(&path)?;
        store.migrate()?;
        Ok(Self {
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn run<F, T>(&self, op: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Store) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = Arc::clone(&self.path);
        let outcome = tokio::task::spawn_blocking(move || {
            let store = Store::connect(&path)?;
            op(&store)
        })
        .await
        .map_err(|err| ApiError::Internal(format!("database task failed: {err}")))?;
        outcome.map_err(ApiError::from)
    }
}
