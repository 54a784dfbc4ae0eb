pub(crate) mod analyze;
pub(crate) mod baseline;
pub(crate) mod estimates;
pub(crate) mod project;
pub(crate) mod track;

use std::path::Path;

use keystone_engine::{EngineError, Outcome};
use keystone_sqlite::SQLITE_SCHEMA_VERSION;

use crate::{fail, Context};

/// Unwrap an engine result or report it and exit 1.
pub(crate) fn or_exit<T>(ctx: &Context, result: Result<Outcome<T>, EngineError>) -> Outcome<T> {
    match result {
        Ok(outcome) => outcome,
        Err(e) => fail(&e, e.kind(), ctx.output, ctx.quiet),
    }
}

pub(crate) fn cmd_init(ctx: &Context, db_path: &Path) {
    // Opening the store already ran the migration.
    let outcome = Outcome::new(
        serde_json::json!({
            "path": db_path.display().to_string(),
            "schema_version": SQLITE_SCHEMA_VERSION,
        }),
        format!(
            "Database ready at {} (schema version {SQLITE_SCHEMA_VERSION})",
            db_path.display()
        ),
    );
    ctx.emit(&outcome, |_| {});
}

/// Print rows as left-aligned, space-padded columns.
pub(crate) fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }
    let line = |cells: Vec<&str>| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, &w)| format!("{c:<w$}"))
            .collect();
        println!("{}", padded.join("  ").trim_end());
    };
    line(headers.to_vec());
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    line(rule.iter().map(String::as_str).collect());
    for row in rows {
        line(row.iter().map(String::as_str).collect());
    }
}
