//! Status command.

use anyhow::Result;
use clap::Args;
use futures::future::join_all;
use std::sync::Arc;

use super::CommandContext;
use crate::cli::output::table::StatusRow;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{AttackTechnique, TechniqueState};
use crate::domain::ports::StateStore;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Attack technique IDs (all registered techniques when omitted)
    pub ids: Vec<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct StatusOutput {
    pub techniques: Vec<StatusRow>,
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        if self.techniques.is_empty() {
            return "No attack techniques registered.".to_string();
        }
        TableFormatter::new().format_status(&self.techniques)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Read the persisted state of every technique. A technique without any
/// recorded state is COLD.
pub async fn collect_status(
    ctx: &CommandContext,
    techniques: &[Arc<AttackTechnique>],
) -> Vec<StatusRow> {
    let rows = techniques.iter().map(|technique| async move {
        let store = ctx.factory.state_store(Arc::clone(technique));
        let state = store.get_technique_state().await.unwrap_or_default();
        StatusRow {
            id: technique.id.clone(),
            name: technique.friendly_name.clone(),
            platform: technique.platform.to_string(),
            state,
        }
    });
    join_all(rows).await
}

/// Techniques whose recorded state is anything but COLD.
pub async fn techniques_not_cold(ctx: &CommandContext) -> Vec<Arc<AttackTechnique>> {
    let techniques = ctx.registry.list();
    let rows = collect_status(ctx, &techniques).await;
    techniques
        .into_iter()
        .zip(rows)
        .filter(|(_, row)| row.state != TechniqueState::Cold)
        .map(|(technique, _)| technique)
        .collect()
}

pub async fn print_status(ctx: &CommandContext, techniques: &[Arc<AttackTechnique>]) {
    let out = StatusOutput {
        techniques: collect_status(ctx, techniques).await,
    };
    output(&out, ctx.json_mode);
}

pub async fn execute(args: StatusArgs, ctx: &CommandContext) -> Result<()> {
    let techniques = if args.ids.is_empty() {
        ctx.registry.list()
    } else {
        ctx.resolve(&args.ids)?
    };
    print_status(ctx, &techniques).await;
    Ok(())
}
