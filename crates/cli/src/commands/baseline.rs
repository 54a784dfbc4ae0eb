use keystone_engine::present;

use super::{or_exit, print_table};
use crate::{BaselineCommands, Context};

pub(crate) fn run(ctx: &Context, command: BaselineCommands) {
    let engine = &ctx.engine;
    match command {
        BaselineCommands::Regenerate { project } => {
            let outcome = or_exit(ctx, engine.regenerate_baseline(project));
            ctx.emit(&outcome, |_| {});
        }
        BaselineCommands::Breakdown { project } => {
            let outcome = or_exit(ctx, engine.generate_breakdown(project));
            ctx.emit(&outcome, |_| {});
        }
        BaselineCommands::Budget { project } => {
            let outcome = or_exit(ctx, engine.generate_budget(project));
            ctx.emit(&outcome, |_| {});
        }
        BaselineCommands::Resources { project } => {
            let outcome = or_exit(ctx, engine.allocate_resources(project));
            ctx.emit(&outcome, |_| {});
        }
        BaselineCommands::Drift { project } => {
            let outcome = or_exit(ctx, engine.budget_drift(project));
            ctx.emit(&outcome, |drift| {
                let mut rows: Vec<Vec<String>> = Vec::new();
                for m in &drift.missing {
                    rows.push(vec![
                        "missing".into(),
                        m.element_id.to_string(),
                        m.code.clone(),
                        String::new(),
                        present::money(m.estimated_cost),
                    ]);
                }
                for o in &drift.orphaned {
                    rows.push(vec![
                        "orphaned".into(),
                        o.element_id.to_string(),
                        o.category.clone(),
                        present::money(o.amount),
                        String::new(),
                    ]);
                }
                for m in &drift.mismatched {
                    rows.push(vec![
                        "mismatch".into(),
                        m.element_id.to_string(),
                        m.code.clone(),
                        present::money(m.budgeted),
                        present::money(m.estimated),
                    ]);
                }
                if !rows.is_empty() {
                    print_table(&["ISSUE", "ELEMENT", "CODE", "BUDGETED", "ESTIMATED"], &rows);
                }
            });
        }
    }
}
