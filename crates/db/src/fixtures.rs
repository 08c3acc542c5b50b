use chrono::Utc;

use carfleet_core::domain::car::{CarInfo, CarNumber, CarStatus};

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

#[derive(Debug, Clone, Copy)]
struct SeedCar {
    number: i64,
    make: &'static str,
    model: &'static str,
    year: i32,
    condition: &'static str,
    status: CarStatus,
}

/// Canonical demo fleet: a mix of mainstream, luxury and older cars so that
/// both sides of the approval threshold are reachable.
#[rustfmt::skip]
const SEED_FLEET: &[SeedCar] = &[
    SeedCar { number: 1, make: "Toyota", model: "Corolla", year: 2020, condition: "Good", status: CarStatus::Available },
    SeedCar { number: 2, make: "Honda", model: "Civic", year: 2019, condition: "Good", status: CarStatus::Rented },
    SeedCar { number: 3, make: "Ford", model: "F-150", year: 2021, condition: "Good", status: CarStatus::AtCleaning },
    SeedCar { number: 4, make: "Chevrolet", model: "Malibu", year: 2018, condition: "Fair", status: CarStatus::Available },
    SeedCar { number: 5, make: "BMW", model: "X5", year: 2022, condition: "Excellent", status: CarStatus::AtCleaning },
    SeedCar { number: 6, make: "Mercedes-Benz", model: "C-Class", year: 2020, condition: "Good", status: CarStatus::Rented },
    SeedCar { number: 7, make: "Audi", model: "A4", year: 2021, condition: "Good", status: CarStatus::Available },
    SeedCar { number: 8, make: "Nissan", model: "Altima", year: 2017, condition: "Fair", status: CarStatus::Available },
    SeedCar { number: 9, make: "Toyota", model: "Camry", year: 2019, condition: "Good", status: CarStatus::Available },
    SeedCar { number: 10, make: "Honda", model: "Accord", year: 2020, condition: "Good", status: CarStatus::Rented },
    SeedCar { number: 11, make: "Ford", model: "Mustang", year: 2022, condition: "Excellent", status: CarStatus::AtCleaning },
    SeedCar { number: 12, make: "Chevrolet", model: "Silverado", year: 2021, condition: "Good", status: CarStatus::Available },
    SeedCar { number: 13, make: "BMW", model: "3 Series", year: 2020, condition: "Good", status: CarStatus::AtCleaning },
    SeedCar { number: 14, make: "Mercedes-Benz", model: "E-Class", year: 2023, condition: "Excellent", status: CarStatus::Available },
    SeedCar { number: 15, make: "Audi", model: "Q5", year: 2022, condition: "Good", status: CarStatus::Rented },
];

impl SeedCar {
    fn to_car(self) -> CarInfo {
        CarInfo {
            number: CarNumber(self.number),
            make: self.make.to_string(),
            model: self.model.to_string(),
            year: self.year,
            condition: self.condition.to_string(),
            status: self.status,
            disposition_date: None,
        }
    }
}

pub struct FleetSeed;

impl FleetSeed {
    pub fn cars() -> Vec<CarInfo> {
        SEED_FLEET.iter().map(|car| car.to_car()).collect()
    }

    /// Inserts the demo fleet. Cars that already exist keep their current state.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        let now = Utc::now().to_rfc3339();
        let mut inserted = 0;

        for car in SEED_FLEET {
            let result = sqlx::query(
                "INSERT INTO car_info (car_number, make, model, year, condition, status, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(car_number) DO NOTHING",
            )
            .bind(car.number)
            .bind(car.make)
            .bind(car.model)
            .bind(car.year)
            .bind(car.condition)
            .bind(car.status.as_key())
            .bind(&now)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(SeedResult { cars_inserted: inserted, fleet_size: SEED_FLEET.len() })
    }

    /// Checks that every seed car is present with its seeded make and model.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::with_capacity(SEED_FLEET.len());
        for car in SEED_FLEET {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM car_info WHERE car_number = ?1 AND make = ?2 AND model = ?3)",
            )
            .bind(car.number)
            .bind(car.make)
            .bind(car.model)
            .fetch_one(pool)
            .await?;
            checks.push((CarNumber(car.number), present == 1));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the seeded cars and any proposals that reference them.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        for car in SEED_FLEET {
            sqlx::query("DELETE FROM approval_proposal WHERE car_number = ?")
                .bind(car.number)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM car_info WHERE car_number = ?")
                .bind(car.number)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub cars_inserted: usize,
    pub fleet_size: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(CarNumber, bool)>,
}
