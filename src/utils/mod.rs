pub mod logger;
pub mod sqlite;
