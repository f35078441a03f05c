//! Query traits implemented directly on [`crate::PgConnection`].

pub mod job;
