//! ferroftpd: an explicit-FTPS server (RFC 959 command channel with
//! RFC 4217 AUTH TLS) built on tokio.

pub mod config;
pub mod constants;
pub mod core_acl;
pub mod core_cli;
pub mod core_ftpcommand;
pub mod core_network;
pub mod core_sandbox;
pub mod core_tls;
pub mod core_transfer;
pub mod error;
pub mod server;
pub mod session;
pub mod supervisor;
pub mod users;

pub use config::Config;
pub use server::Server;
