use chrono::{NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;

use carfleet_core::domain::car::{CarInfo, CarNumber, CarStatus};

use super::{column, CarRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCarRepository {
    pool: DbPool,
}

impl SqlCarRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_car(row: &SqliteRow) -> Result<CarInfo, RepositoryError> {
    let status: String = column(row, "status")?;
    let disposition_date: Option<String> = column(row, "disposition_date")?;
    let disposition_date = disposition_date
        .map(|value| {
            NaiveDate::parse_from_str(&value, "%Y-%m-%d")
                .map_err(|e| RepositoryError::Decode(format!("disposition_date `{value}`: {e}")))
        })
        .transpose()?;

    Ok(CarInfo {
        number: CarNumber(column(row, "car_number")?),
        make: column(row, "make")?,
        model: column(row, "model")?,
        year: column(row, "year")?,
        condition: column(row, "condition")?,
        status: CarStatus::parse_key(&status)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        disposition_date,
    })
}

#[async_trait::async_trait]
impl CarRepository for SqlCarRepository {
    async fn find_by_number(&self, number: CarNumber) -> Result<Option<CarInfo>, RepositoryError> {
        let row = sqlx::query(
            "SELECT car_number, make, model, year, condition, status, disposition_date
             FROM car_info WHERE car_number = ?",
        )
        .bind(number.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_car).transpose()
    }

    async fn list(&self) -> Result<Vec<CarInfo>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT car_number, make, model, year, condition, status, disposition_date
             FROM car_info ORDER BY car_number",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_car).collect()
    }

    async fn save(&self, car: CarInfo) -> Result<(), RepositoryError> {
        let disposition_date = car.disposition_date.map(|date| date.format("%Y-%m-%d").to_string());

        sqlx::query(
            "INSERT INTO car_info (car_number, make, model, year, condition, status,
                                   disposition_date, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(car_number) DO UPDATE SET
                 make = excluded.make,
                 model = excluded.model,
                 year = excluded.year,
                 condition = excluded.condition,
                 status = excluded.status,
                 disposition_date = excluded.disposition_date,
                 updated_at = excluded.updated_at",
        )
        .bind(car.number.0)
        .bind(&car.make)
        .bind(&car.model)
        .bind(car.year)
        .bind(&car.condition)
        .bind(car.status.as_key())
        .bind(disposition_date)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
