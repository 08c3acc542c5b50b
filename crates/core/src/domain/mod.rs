pub mod car;
pub mod conditions;
pub mod proposal;
