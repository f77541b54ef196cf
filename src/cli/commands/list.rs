//! List command.

use anyhow::Result;
use clap::Args;

use super::CommandContext;
use crate::cli::output::table::TechniqueRow;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::Platform;
use crate::services::TechniqueRegistry;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only list techniques for this platform (aws, azure, gcp, kubernetes, entra-id)
    #[arg(short, long)]
    pub platform: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct ListOutput {
    pub techniques: Vec<TechniqueRow>,
    pub total: usize,
}

impl CommandOutput for ListOutput {
    fn to_human(&self) -> String {
        if self.techniques.is_empty() {
            return "No attack techniques registered.".to_string();
        }
        format!(
            "{}\n{} technique(s)",
            TableFormatter::new().format_techniques(&self.techniques),
            self.total
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: ListArgs, ctx: &CommandContext) -> Result<()> {
    let platform = args
        .platform
        .as_deref()
        .map(|raw| {
            Platform::from_str(raw).ok_or_else(|| anyhow::anyhow!("Invalid platform: {raw}"))
        })
        .transpose()?;

    let techniques = technique_rows(&ctx.registry, platform);
    let out = ListOutput {
        total: techniques.len(),
        techniques,
    };
    output(&out, ctx.json_mode);
    Ok(())
}

fn technique_rows(registry: &TechniqueRegistry, platform: Option<Platform>) -> Vec<TechniqueRow> {
    registry
        .list()
        .iter()
        .filter(|t| platform.map_or(true, |p| t.platform == p))
        .map(|t| TechniqueRow {
            id: t.id.clone(),
            name: t.friendly_name.clone(),
            description: t.description.clone(),
            platform: t.platform.to_string(),
            idempotent: t.is_idempotent,
            slow: t.is_slow,
            prerequisites: t.has_prerequisites(),
            revert: t.has_revert(),
        })
        .collect()
}
