//! Attack technique capability record.
//!
//! Techniques are supplied by a catalog and registered at startup. The core
//! only reads this record: it never inspects a technique beyond these fields.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::providers::CloudProviders;

/// Outputs captured from the provisioning step, keyed by output name.
pub type TerraformOutputs = HashMap<String, String>;

/// Reserved output rendered to the operator after warm-up.
pub const DISPLAY_OUTPUT_KEY: &str = "display";

/// A detonation or revert action.
///
/// Actions are blocking calls against cloud APIs; the runner executes them on
/// the blocking thread pool and assumes no cancellation contract.
pub type TechniqueAction =
    Arc<dyn Fn(&TerraformOutputs, &CloudProviders) -> anyhow::Result<()> + Send + Sync>;

/// Cloud platform a technique targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    Aws,
    Azure,
    Gcp,
    Kubernetes,
    EntraId,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aws => "AWS",
            Self::Azure => "Azure",
            Self::Gcp => "GCP",
            Self::Kubernetes => "Kubernetes",
            Self::EntraId => "Entra ID",
        }
    }

    /// Parse the kebab-case name used on the command line.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "aws" => Some(Self::Aws),
            "azure" => Some(Self::Azure),
            "gcp" => Some(Self::Gcp),
            "kubernetes" | "k8s" => Some(Self::Kubernetes),
            "entra-id" | "entraid" => Some(Self::EntraId),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An attack technique as seen by the runner.
#[derive(Clone)]
pub struct AttackTechnique {
    /// Stable identifier, e.g. `aws.defense-evasion.cloudtrail-stop`
    pub id: String,
    pub friendly_name: String,
    pub description: String,
    pub platform: Platform,
    /// Safe to detonate again without reverting
    pub is_idempotent: bool,
    /// Informational only
    pub is_slow: bool,
    /// Terraform code for the prerequisites; `None` makes warm-up a no-op
    pub prerequisites_terraform_code: Option<String>,
    pub detonate: TechniqueAction,
    pub revert: Option<TechniqueAction>,
}

impl AttackTechnique {
    pub fn new<F>(id: impl Into<String>, platform: Platform, detonate: F) -> Self
    where
        F: Fn(&TerraformOutputs, &CloudProviders) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = id.into();
        Self {
            friendly_name: id.clone(),
            id,
            description: String::new(),
            platform,
            is_idempotent: false,
            is_slow: false,
            prerequisites_terraform_code: None,
            detonate: Arc::new(detonate),
            revert: None,
        }
    }

    #[must_use]
    pub fn with_friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = name.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_prerequisites(mut self, terraform_code: impl Into<String>) -> Self {
        self.prerequisites_terraform_code = Some(terraform_code.into());
        self
    }

    #[must_use]
    pub fn with_revert<F>(mut self, revert: F) -> Self
    where
        F: Fn(&TerraformOutputs, &CloudProviders) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.revert = Some(Arc::new(revert));
        self
    }

    #[must_use]
    pub fn idempotent(mut self, is_idempotent: bool) -> Self {
        self.is_idempotent = is_idempotent;
        self
    }

    #[must_use]
    pub fn slow(mut self, is_slow: bool) -> Self {
        self.is_slow = is_slow;
        self
    }

    pub fn has_prerequisites(&self) -> bool {
        self.prerequisites_terraform_code.is_some()
    }

    pub fn has_revert(&self) -> bool {
        self.revert.is_some()
    }
}

impl fmt::Debug for AttackTechnique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttackTechnique")
            .field("id", &self.id)
            .field("platform", &self.platform)
            .field("is_idempotent", &self.is_idempotent)
            .field("is_slow", &self.is_slow)
            .field("has_prerequisites", &self.has_prerequisites())
            .field("has_revert", &self.has_revert())
            .finish_non_exhaustive()
    }
}

/// Text of the `display` output, with literal `\n` sequences turned into line breaks.
pub fn display_text(outputs: &TerraformOutputs) -> Option<String> {
    outputs
        .get(DISPLAY_OUTPUT_KEY)
        .map(|display| display.replace("\\n", "\n"))
}
