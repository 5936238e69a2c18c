//! Model file resolution
//!
//! A model directory under the cache root wins over a hub download, so
//! air-gapped machines can ship weights next to the binary.

use anyhow::{Context, Result};
use hf_hub::api::sync::ApiBuilder;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";

/// Paths to the three files a candle BERT model needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    /// Files inside a local model directory, if all three exist
    pub fn from_dir(dir: &Path) -> Option<Self> {
        let files = Self {
            config: dir.join(CONFIG_FILE),
            tokenizer: dir.join(TOKENIZER_FILE),
            weights: dir.join(WEIGHTS_FILE),
        };
        let complete = files.config.is_file() && files.tokenizer.is_file() && files.weights.is_file();
        complete.then_some(files)
    }

    /// Locate model files for `repo_id`
    ///
    /// Lookup order:
    /// 1. `repo_id` itself as a directory path
    /// 2. `<cache_dir>/<last segment of repo_id>/`
    /// 3. Hugging Face hub download into `cache_dir`
    pub fn resolve(repo_id: &str, cache_dir: Option<&Path>) -> Result<Self> {
        if let Some(files) = Self::from_dir(Path::new(repo_id)) {
            tracing::info!(path = repo_id, "Using model directory");
            return Ok(files);
        }

        if let Some(local) = cache_dir.map(|dir| local_model_dir(dir, repo_id)) {
            if let Some(files) = Self::from_dir(&local) {
                tracing::info!(path = %local.display(), "Using local model copy");
                return Ok(files);
            }
        }

        tracing::info!(repo = repo_id, "Fetching model from Hugging Face hub");
        let mut builder = ApiBuilder::new().with_progress(false);
        if let Some(dir) = cache_dir {
            builder = builder.with_cache_dir(dir.to_path_buf());
        }
        let api = builder
            .build()
            .context("Failed to create HuggingFace API client")?;
        let repo = api.model(repo_id.to_string());

        Ok(Self {
            config: repo
                .get(CONFIG_FILE)
                .with_context(|| format!("Failed to download {} config", repo_id))?,
            tokenizer: repo
                .get(TOKENIZER_FILE)
                .with_context(|| format!("Failed to download {} tokenizer", repo_id))?,
            weights: repo
                .get(WEIGHTS_FILE)
                .with_context(|| format!("Failed to download {} weights", repo_id))?,
        })
    }
}

/// `<cache_dir>/<name>` where name is the part after the last `/`
pub fn local_model_dir(cache_dir: &Path, repo_id: &str) -> PathBuf {
    let name = repo_id.rsplit('/').next().unwrap_or(repo_id);
    cache_dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn populate(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        for name in [CONFIG_FILE, TOKENIZER_FILE, WEIGHTS_FILE] {
            fs::write(dir.join(name), b"{}").unwrap();
        }
    }

    #[test]
    fn test_local_model_dir_uses_repo_name() {
        let dir = local_model_dir(Path::new("/models"), "cross-encoder/ms-marco-MiniLM-L-12-v2");
        assert_eq!(dir, PathBuf::from("/models/ms-marco-MiniLM-L-12-v2"));
    }

    #[test]
    fn test_resolve_prefers_local_copy() {
        let cache = TempDir::new().unwrap();
        let local = cache.path().join("paraphrase-multilingual-MiniLM-L12-v2");
        populate(&local);

        let files = ModelFiles::resolve(
            "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2",
            Some(cache.path()),
        )
        .unwrap();
        assert_eq!(files.weights, local.join(WEIGHTS_FILE));
    }

    #[test]
    fn test_incomplete_dir_is_ignored() {
        let cache = TempDir::new().unwrap();
        fs::write(cache.path().join(CONFIG_FILE), b"{}").unwrap();
        assert!(ModelFiles::from_dir(cache.path()).is_none());
    }

    #[test]
    fn test_repo_id_as_path() {
        let dir = TempDir::new().unwrap();
        populate(dir.path());
        let repo_id = dir.path().to_string_lossy().to_string();
        let files = ModelFiles::resolve(&repo_id, None).unwrap();
        assert_eq!(files.config, dir.path().join(CONFIG_FILE));
    }
}
