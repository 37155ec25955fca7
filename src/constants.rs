// src/constants.rs

/// Longest control-channel line the server keeps; excess bytes are discarded.
pub const MAX_COMMAND_LINE: usize = 1024;

/// Fixed buffer size used by the transfer engine.
pub const TRANSFER_BUFFER_SIZE: usize = 8 * 1024;

/// Deadline for accepting (PASV) or connecting (PORT) a data channel.
pub const DATA_CHANNEL_TIMEOUT_SECS: u64 = 10;

/// How often the supervisor scans for dead or idle sessions.
pub const REAPER_INTERVAL_SECS: u64 = 60;

/// How often the dormant connection pool is trimmed.
pub const POOL_MAINTENANCE_INTERVAL_SECS: u64 = 60;

/// Control-channel idle timeout when the configuration does not set one.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u32 = 300;

/// Lowest peer port PORT will connect to (anti-bounce).
pub const MIN_ACTIVE_PORT: u16 = 1024;

pub const PID_FILE: &str = "/var/run/ferroftpd.pid";
