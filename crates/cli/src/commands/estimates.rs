use std::path::Path;

use keystone_storage::{NewEstimateLine, ProjectId};

use super::or_exit;
use crate::{fail, Context, EstimateCommands};

pub(crate) fn run(ctx: &Context, command: EstimateCommands) {
    match command {
        EstimateCommands::Import { file, project } => cmd_import(ctx, &file, project),
    }
}

fn cmd_import(ctx: &Context, file: &Path, project: Option<ProjectId>) {
    let text = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => fail(
            format!("cannot read estimate file '{}': {e}", file.display()),
            "invalid_input",
            ctx.output,
            ctx.quiet,
        ),
    };
    let lines: Vec<NewEstimateLine> = match serde_json::from_str(&text) {
        Ok(lines) => lines,
        Err(e) => fail(
            format!("invalid estimate JSON in '{}': {e}", file.display()),
            "invalid_input",
            ctx.output,
            ctx.quiet,
        ),
    };

    let outcome = or_exit(ctx, ctx.engine.import_estimates(project, lines));
    ctx.emit(&outcome, |_| {});
}
