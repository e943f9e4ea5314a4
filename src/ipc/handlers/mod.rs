pub mod core;
pub mod dashboard;
pub mod enrollment;
pub mod exports;
pub mod imports;
pub mod schools;
pub mod setup;
pub mod students;
