//! Pipeline context
//!
//! The context is computed once when a run starts and is read-only for the
//! rest of the run. Every stage receives it by reference and derives its
//! command arguments from these typed fields.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Immutable values shared by every stage of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineContext {
    /// Cloud account that owns the registry and cluster
    pub account_id: String,
    pub region: String,
    /// Registry repository name (also the local image name)
    pub repository: String,
    /// Image tag, normally the build number
    pub image_tag: String,
    pub commit: String,
    pub branch: String,
    pub cluster_name: String,
    pub namespace: String,
    pub deployment: String,
    /// Container inside the deployment whose image is replaced
    pub container: String,
    /// Service whose load balancer exposes the application
    pub service: String,
    /// Checked-out source tree
    pub workspace: PathBuf,
    /// Optional directory of manifests applied before the image update
    pub manifests_dir: Option<PathBuf>,
    /// Code-quality project key
    pub project_key: String,
}

impl PipelineContext {
    /// Registry host for the account and region
    ///
    /// e.g. `111111111111.dkr.ecr.us-east-1.amazonaws.com`
    pub fn registry(&self) -> String {
        format!("{}.dkr.ecr.{}.amazonaws.com", self.account_id, self.region)
    }

    /// Fully qualified image reference pushed and deployed by this run
    pub fn image_reference(&self) -> String {
        format!("{}/{}:{}", self.registry(), self.repository, self.image_tag)
    }

    /// Moving `latest` tag in the registry
    pub fn latest_reference(&self) -> String {
        format!("{}/{}:latest", self.registry(), self.repository)
    }

    /// Image name as built locally, before tagging for the registry
    pub fn local_image(&self) -> String {
        format!("{}:{}", self.repository, self.image_tag)
    }

    pub fn short_commit(&self) -> &str {
        let end = self
            .commit
            .char_indices()
            .nth(7)
            .map(|(idx, _)| idx)
            .unwrap_or(self.commit.len());
        &self.commit[..end]
    }

    /// `deployment/<name>` as understood by kubectl
    pub fn deployment_ref(&self) -> String {
        format!("deployment/{}", self.deployment)
    }
}
