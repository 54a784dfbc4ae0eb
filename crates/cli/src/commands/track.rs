use keystone_engine::{ActualCostInput, ProgressInput};

use super::or_exit;
use crate::{Context, TrackCommands};

pub(crate) fn run(ctx: &Context, command: TrackCommands) {
    match command {
        TrackCommands::Actual {
            project,
            amount,
            date,
            element,
            category,
            description,
        } => {
            let outcome = or_exit(
                ctx,
                ctx.engine.record_actual_cost(
                    project,
                    ActualCostInput {
                        element_id: element,
                        category,
                        description,
                        amount,
                        transaction_date: date,
                    },
                ),
            );
            ctx.emit(&outcome, |_| {});
        }
        TrackCommands::Progress {
            project,
            element,
            percent,
            date,
            notes,
        } => {
            let outcome = or_exit(
                ctx,
                ctx.engine.record_progress(
                    project,
                    ProgressInput {
                        element_id: element,
                        percent_complete: percent,
                        update_date: date,
                        notes,
                    },
                ),
            );
            ctx.emit(&outcome, |_| {});
        }
    }
}
