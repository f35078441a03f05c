//! Row models mapped onto the database schema via Diesel.

pub mod job;
