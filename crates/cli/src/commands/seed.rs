use carfleet_db::{migrations, FleetSeed};

use crate::commands::{run_against_database, CommandFailure, CommandResult, FailureClass};

pub fn run() -> CommandResult {
    run_against_database("seed", |pool| async move {
        migrations::run_pending(&pool).await.map_err(FailureClass::Migration.wrap())?;
        let seeded = FleetSeed::load(&pool).await.map_err(FailureClass::SeedExecution.wrap())?;
        let verification =
            FleetSeed::verify(&pool).await.map_err(FailureClass::SeedVerification.wrap())?;

        if !verification.all_present {
            let missing = verification
                .checks
                .iter()
                .filter_map(|(car, present)| (!present).then_some(car.0))
                .collect::<Vec<_>>();
            return Err(CommandFailure::new(
                FailureClass::SeedVerification,
                missing_message(&missing),
            ));
        }
        Ok(format!(
            "demo fleet ready: {} cars ({} newly inserted)",
            seeded.fleet_size, seeded.cars_inserted
        ))
    })
}

fn missing_message(missing: &[i64]) -> String {
    if missing.is_empty() {
        return "some seed cars failed to load".to_string();
    }
    let numbers = missing.iter().map(|n| n.to_string()).collect::<Vec<_>>();
    format!("seed verification failed for cars: {}", numbers.join(", "))
}
