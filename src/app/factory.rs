use crate::{
    app::remote::AppRemote,
    config::Config,
    semantic::{model_id_for, DocumentStore, EmbeddingModel, SemanticSearchService},
    storage,
};
use anyhow::{Context, Result};
use homedir::my_home;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_REMOTE_ADDR: &str = "http://127.0.0.1:8000";

/// Application factory for creating and configuring application components
pub struct AppFactory;

impl AppFactory {
    /// Load the model and rebuild the index from the store directory.
    ///
    /// Downloads the embedding model on first run.
    pub fn create_service(paths: &AppPaths, config: &Config) -> Result<Arc<SemanticSearchService>> {
        let semantic_config = config.semantic_search.clone();
        let timeout = Duration::from_secs(semantic_config.download_timeout_secs);
        let model = EmbeddingModel::new(&semantic_config.model, paths.base_path.clone(), Some(timeout))
            .context("Failed to initialize embedding model")?;

        let backend = storage::BackendLocal::new(&paths.store_path)
            .context("Failed to open document store")?;

        Ok(Arc::new(SemanticSearchService::open(
            semantic_config,
            Arc::new(model),
            Arc::new(backend),
        )))
    }

    /// Open the document store directly, without loading a model.
    ///
    /// Artifacts are still checked against the configured model name.
    pub fn create_store(paths: &AppPaths, config: &Config) -> Result<DocumentStore> {
        let backend = storage::BackendLocal::new(&paths.store_path)
            .context("Failed to open document store")?;

        Ok(DocumentStore::new(
            Arc::new(backend),
            model_id_for(&config.semantic_search.model),
            None,
        ))
    }

    /// Client for a running daemon, at PDFVEC_ADDR or the default local address
    pub fn create_remote() -> AppRemote {
        let addr = std::env::var("PDFVEC_ADDR").unwrap_or_else(|_| DEFAULT_REMOTE_ADDR.to_string());
        log::debug!("Using remote backend: {}", addr);
        AppRemote::new(&addr)
    }

    /// Get application paths, creating the base directory
    pub fn get_paths() -> Result<AppPaths> {
        let base_path = Self::get_base_path()?;
        std::fs::create_dir_all(&base_path)
            .context("Failed to create application base directory")?;

        Ok(AppPaths::new(base_path))
    }

    pub fn create_config(paths: &AppPaths) -> Result<Config> {
        Config::load_with(&paths.base_path).context("Failed to load config.yaml")
    }

    /// Get the base path for the application
    fn get_base_path() -> Result<PathBuf> {
        if let Ok(base_path) = std::env::var("PDFVEC_BASE_PATH") {
            return Ok(PathBuf::from(base_path));
        }

        let home = my_home()
            .context("Could not determine home directory")?
            .context("Home directory path is empty")?;
        Ok(home.join(".local/share/pdfvec"))
    }
}

/// Application paths structure
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub base_path: PathBuf,
    /// Embedding artifacts and uploaded files
    pub store_path: PathBuf,
}

impl AppPaths {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        let base_path = base_path.as_ref().to_path_buf();
        Self {
            store_path: base_path.join("pdf_store"),
            base_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_paths() {
        let paths = AppPaths::new("/test/base");

        assert_eq!(paths.base_path, PathBuf::from("/test/base"));
        assert_eq!(paths.store_path, PathBuf::from("/test/base/pdf_store"));
    }

    #[test]
    fn test_create_store_reads_without_model() {
        use crate::semantic::{DocumentEntry, PageRecord};

        let tmp = tempfile::tempdir().unwrap();
        let paths = AppPaths::new(tmp.path());
        let config = Config::load_with(tmp.path()).unwrap();

        let store = AppFactory::create_store(&paths, &config).unwrap();
        let entry = DocumentEntry::new(
            "paper",
            vec![PageRecord {
                page: 2,
                text: "text".to_string(),
            }],
            vec![vec![0.5; 8]],
        )
        .unwrap();
        store.save(&entry).unwrap();

        assert_eq!(store.load("paper").unwrap(), entry);
        assert!(paths.store_path.join("paper.vec").exists());
    }
}
