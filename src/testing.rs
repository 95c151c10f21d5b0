//! Test infrastructure
//!
//! `session` provides a scripted in-memory [`crate::session::Session`] for
//! unit tests; `mysql` connects to the servers named by `MYSQL_TEST_URL` and
//! `MYSQL_TEST_DEST_URL` for integration tests.

pub mod mysql;
pub mod session;

pub use mysql::{connect_destination, connect_source, create_mysql_config, reset_database};
pub use session::ScriptedSession;
