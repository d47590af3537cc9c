//! Remote-code trust decisions and the loader seam for repository-defined
//! processor classes.

use std::sync::Arc;
use tracing::warn;

use super::registry::ProcessorFactory;
use crate::config::ResolveOptions;
use crate::error::{Error, Result};

/// Inputs to a trust decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustRequest {
    /// What the caller asked for, if anything
    pub requested: Option<bool>,
    pub identifier: String,
    pub has_local_code: bool,
    pub has_remote_code: bool,
    /// Repository hosting the code when the reference names one (`repo--module.Class`)
    pub upstream_repo: Option<String>,
}

impl TrustRequest {
    pub fn new(
        requested: Option<bool>,
        identifier: &str,
        has_local_code: bool,
        remote_reference: &str,
    ) -> Self {
        let upstream_repo = remote_reference
            .split_once("--")
            .map(|(repo, _)| repo.to_string());
        Self {
            requested,
            identifier: identifier.to_string(),
            has_local_code,
            has_remote_code: true,
            upstream_repo,
        }
    }
}

pub trait TrustPolicy: Send + Sync {
    fn resolve(&self, request: &TrustRequest) -> Result<bool>;
}

/// Explicit requests win. Without one, local code is preferred and
/// remote-only repositories are refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTrustPolicy;

impl TrustPolicy for DefaultTrustPolicy {
    fn resolve(&self, request: &TrustRequest) -> Result<bool> {
        if let Some(requested) = request.requested {
            if requested && request.has_remote_code {
                if let Some(upstream) = &request.upstream_repo {
                    warn!(
                        "Executing code from {upstream} to load the processor of {}",
                        request.identifier
                    );
                }
            }
            return Ok(requested);
        }
        if request.has_local_code {
            return Ok(false);
        }
        if request.has_remote_code {
            return Err(Error::UntrustedRemoteCode {
                identifier: request.identifier.clone(),
            });
        }
        Ok(false)
    }
}

/// Turns an `auto_map` reference into a processor factory.
pub trait DynamicModuleLoader: Send + Sync {
    fn load(
        &self,
        reference: &str,
        identifier: &str,
        options: &ResolveOptions,
    ) -> Result<Arc<dyn ProcessorFactory>>;
}

/// Loader for builds that cannot run repository code.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRemoteCode;

impl DynamicModuleLoader for NoRemoteCode {
    fn load(
        &self,
        reference: &str,
        identifier: &str,
        _options: &ResolveOptions,
    ) -> Result<Arc<dyn ProcessorFactory>> {
        Err(Error::ModelLoadError(format!(
            "{identifier} requires remote processor code ({reference}), which this build cannot execute"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_repo_is_split_from_reference() {
        let req = TrustRequest::new(None, "me/model", false, "acme/shared--processing.Proc");
        assert_eq!(req.upstream_repo.as_deref(), Some("acme/shared"));

        let req = TrustRequest::new(None, "me/model", false, "processing.Proc");
        assert_eq!(req.upstream_repo, None);
    }

    #[test]
    fn default_policy() {
        let policy = DefaultTrustPolicy;

        let explicit = TrustRequest::new(Some(true), "m", false, "p.P");
        assert!(policy.resolve(&explicit).unwrap());

        let local = TrustRequest::new(None, "m", true, "p.P");
        assert!(!policy.resolve(&local).unwrap());

        let remote_only = TrustRequest::new(None, "m", false, "p.P");
        assert!(matches!(
            policy.resolve(&remote_only),
            Err(Error::UntrustedRemoteCode { .. })
        ));
    }
}
