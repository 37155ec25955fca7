use chrono::{DateTime, Utc};

use crate::core_ftpcommand::handlers::sandbox_roots;
use crate::core_ftpcommand::Reply;
use crate::core_sandbox;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;

/// Handles the MDTM command: last modification time as `YYYYMMDDHHMMSS`
/// in UTC.
pub async fn handle_mdtm_command(
    session: &mut Session,
    _ctx: &ServerContext,
    arg: &str,
) -> Result<Reply, CommandError> {
    if arg.is_empty() {
        return Err(CommandError::Protocol(String::from(
            "Syntax error in parameters or arguments.",
        )));
    }

    let (cwd, home) = sandbox_roots(session)?;
    let path = core_sandbox::resolve(&cwd, &home, arg)?;
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(CommandError::from_fs)?;
    if !metadata.is_file() {
        return Err(CommandError::NotFound);
    }

    let modified: DateTime<Utc> = metadata
        .modified()
        .map_err(|_| CommandError::LocalError)?
        .into();
    Ok(Reply::new(213, modified.format("%Y%m%d%H%M%S").to_string()))
}
