//! Shared SQLite database access

mod init;

pub use init::init_database;
