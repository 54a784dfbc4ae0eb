use keystone_engine::{present, Outcome, ProjectInput};

use super::{or_exit, print_table};
use crate::{fail, Context, ProjectCommands};

pub(crate) fn run(ctx: &Context, command: ProjectCommands) {
    match command {
        ProjectCommands::Create { name, start, end } => {
            let outcome = or_exit(
                ctx,
                ctx.engine.create_project(ProjectInput {
                    name,
                    start_date: start,
                    end_date: end,
                    status: None,
                }),
            );
            ctx.emit(&outcome, |id| println!("{id}"));
        }
        ProjectCommands::Status { project, status } => {
            let outcome = or_exit(ctx, ctx.engine.transition_project(project, status));
            ctx.emit(&outcome, |_| {});
        }
        ProjectCommands::List => {
            let projects = match ctx.engine.list_projects() {
                Ok(p) => p,
                Err(e) => fail(&e, e.kind(), ctx.output, ctx.quiet),
            };
            let message = format!("{} project(s)", projects.len());
            ctx.emit(&Outcome::new(projects, message), |projects| {
                let rows: Vec<Vec<String>> = projects
                    .iter()
                    .map(|p| {
                        vec![
                            p.id.to_string(),
                            p.name.clone(),
                            p.status.to_string(),
                            p.start_date.map(|d| d.to_string()).unwrap_or_default(),
                            p.end_date.map(|d| d.to_string()).unwrap_or_default(),
                            present::money(p.estimated_cost),
                        ]
                    })
                    .collect();
                print_table(&["ID", "NAME", "STATUS", "START", "END", "ESTIMATED"], &rows);
            });
        }
    }
}
