use keystone_engine::present::{money, percent, ratio};
use keystone_engine::FindingSeverity;

use super::{or_exit, print_table};
use crate::{AnalyzeCommands, Context};

pub(crate) fn run(ctx: &Context, command: AnalyzeCommands) {
    let engine = &ctx.engine;
    match command {
        AnalyzeCommands::Cost { project } => {
            let outcome = or_exit(ctx, engine.analyze_cost_variance(project));
            ctx.emit(&outcome, |report| {
                let rows: Vec<Vec<String>> = report
                    .rows
                    .iter()
                    .map(|r| {
                        vec![
                            r.code.clone(),
                            money(r.estimated_cost),
                            money(r.actual_cost),
                            percent(Some(r.percent_complete)),
                            money(r.earned_value),
                            money(r.cost_variance),
                            percent(r.cost_variance_pct),
                        ]
                    })
                    .collect();
                print_table(&["CODE", "ESTIMATED", "AC", "PC%", "EV", "CV", "CV%"], &rows);
                if report.unattributed_actual_cost > 0.0 {
                    println!(
                        "Unattributed actual cost: {}",
                        money(report.unattributed_actual_cost)
                    );
                }
            });
        }
        AnalyzeCommands::Schedule { project } => {
            let outcome = or_exit(ctx, engine.analyze_schedule_variance(project));
            ctx.emit(&outcome, |report| {
                let rows: Vec<Vec<String>> = report
                    .rows
                    .iter()
                    .map(|r| {
                        vec![
                            r.code.clone(),
                            money(r.planned_value),
                            percent(Some(r.percent_complete)),
                            money(r.earned_value),
                            money(r.schedule_variance),
                            ratio(r.spi),
                        ]
                    })
                    .collect();
                print_table(&["CODE", "PV", "PC%", "EV", "SV", "SPI"], &rows);
            });
        }
        AnalyzeCommands::Summary { project } => {
            let outcome = or_exit(ctx, engine.project_summary_performance(project));
            ctx.emit(&outcome, |s| {
                println!("EV   {}", money(s.earned_value));
                println!("AC   {}", money(s.actual_cost));
                println!("BAC  {}", money(s.budget_at_completion));
                println!("PV   {}", money(s.planned_value));
                println!("CV   {}", money(s.cost_variance));
                println!("SV   {}", money(s.schedule_variance));
                println!("CPI  {}", ratio(s.cpi));
                println!("SPI  {}", ratio(s.spi));
                for f in &s.findings {
                    let tag = match f.severity {
                        FindingSeverity::Warning => "warning",
                        FindingSeverity::Info => "info",
                    };
                    println!("[{tag}] {}", f.message);
                }
            });
        }
    }
}
