pub mod repository;
pub mod snapshot;
pub mod sqlite;
