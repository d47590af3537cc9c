//! File lookup for model repositories: local directories and the HuggingFace Hub cache.

use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Cache, Repo, RepoType};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{HubConfig, ResolveOptions};
use crate::error::{Error, Result};

/// Resolves a file inside a model repository to a local path.
///
/// Missing files, gated repositories and connection failures all yield
/// `Ok(None)` so callers can move on to their next candidate.
pub trait FileFetcher: Send + Sync {
    fn cached_file(
        &self,
        identifier: &str,
        filename: &str,
        options: &ResolveOptions,
    ) -> Result<Option<PathBuf>>;
}

/// Default fetcher: local directories first, then the hub.
#[derive(Debug, Clone, Default)]
pub struct HubFetcher {
    config: HubConfig,
}

impl HubFetcher {
    pub fn new(config: HubConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    fn repo(&self, identifier: &str, options: &ResolveOptions) -> Repo {
        let revision = options
            .revision
            .clone()
            .unwrap_or_else(|| self.config.revision.clone());
        Repo::with_revision(identifier.to_string(), RepoType::Model, revision)
    }

    fn fetch_remote(
        &self,
        identifier: &str,
        filename: &str,
        options: &ResolveOptions,
    ) -> Result<Option<PathBuf>> {
        let cache_dir = options
            .cache_dir
            .clone()
            .unwrap_or_else(|| self.config.cache_dir.clone());

        if self.config.offline {
            let cached = Cache::new(cache_dir)
                .repo(self.repo(identifier, options))
                .get(filename);
            debug!("Offline lookup of {identifier}/{filename}: {cached:?}");
            return Ok(cached);
        }

        let token = options.token.clone().or_else(|| self.config.token.clone());
        let api = ApiBuilder::new()
            .with_cache_dir(cache_dir)
            .with_token(token)
            .with_endpoint(self.config.endpoint.clone())
            .with_progress(false)
            .build()
            .map_err(|e| Error::HfHubError(e.to_string()))?;
        let repo = api.repo(self.repo(identifier, options));

        let fetched = if options.force_download {
            repo.download(filename)
        } else {
            repo.get(filename)
        };

        match fetched {
            Ok(path) => {
                debug!("Fetched {identifier}/{filename} -> {path:?}");
                Ok(Some(path))
            }
            Err(e) => {
                debug!("Could not fetch {identifier}/{filename}: {e}");
                Ok(None)
            }
        }
    }
}

impl FileFetcher for HubFetcher {
    fn cached_file(
        &self,
        identifier: &str,
        filename: &str,
        options: &ResolveOptions,
    ) -> Result<Option<PathBuf>> {
        if is_local_reference(identifier) {
            let candidate = Path::new(identifier).join(filename);
            return Ok(candidate.is_file().then_some(candidate));
        }
        if !is_valid_repo_id(identifier) {
            debug!("{identifier:?} is neither a local directory nor a repository id");
            return Ok(None);
        }
        self.fetch_remote(identifier, filename, options)
    }
}

/// Whether `identifier` names something on the local filesystem rather than a hub repository.
pub fn is_local_reference(identifier: &str) -> bool {
    let path = Path::new(identifier);
    path.exists()
        || path.is_absolute()
        || identifier.starts_with('.')
        || identifier.starts_with('~')
        || identifier.contains('\\')
        || identifier.matches('/').count() > 1
}

fn is_valid_repo_id(identifier: &str) -> bool {
    let trimmed = identifier.trim();
    !trimmed.is_empty()
        && !trimmed.contains("..")
        && !trimmed.starts_with('/')
        && !trimmed.ends_with('/')
        && trimmed
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_directory_hit_and_miss() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();
        let fetcher = HubFetcher::default();
        let id = dir.path().to_str().unwrap();
        let opts = ResolveOptions::default();

        let hit = fetcher.cached_file(id, "config.json", &opts).unwrap();
        assert_eq!(hit, Some(dir.path().join("config.json")));

        let miss = fetcher.cached_file(id, "tokenizer_config.json", &opts).unwrap();
        assert!(miss.is_none());
    }

    #[test]
    fn missing_local_path_is_not_sent_to_the_hub() {
        let fetcher = HubFetcher::default();
        let opts = ResolveOptions::default();
        let found = fetcher
            .cached_file("/definitely/not/here", "config.json", &opts)
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn repo_id_validation() {
        assert!(is_valid_repo_id("facebook/wav2vec2-base-960h"));
        assert!(is_valid_repo_id("bert-base-uncased"));
        assert!(!is_valid_repo_id("../escape"));
        assert!(!is_valid_repo_id("bad id"));
        assert!(!is_valid_repo_id(""));
    }
}
