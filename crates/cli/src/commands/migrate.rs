use carfleet_db::migrations;

use crate::commands::{run_against_database, CommandResult, FailureClass};

pub fn run() -> CommandResult {
    run_against_database("migrate", |pool| async move {
        migrations::run_pending(&pool).await.map_err(FailureClass::Migration.wrap())?;
        let schema = migrations::status(&pool).await.map_err(FailureClass::Migration.wrap())?;
        Ok(format!(
            "schema up to date ({} migrations applied, {} cars on record)",
            schema.applied_migrations, schema.cars_on_record
        ))
    })
}
