use log::info;

use crate::core_ftpcommand::handlers::sandbox_roots;
use crate::core_ftpcommand::Reply;
use crate::core_sandbox;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;

/// Handles the DELE command. Directories are refused; RMD removes those.
pub async fn handle_dele_command(
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
    let metadata = tokio::fs::symlink_metadata(&path)
        .await
        .map_err(CommandError::from_fs)?;
    if metadata.is_dir() {
        return Err(CommandError::InvalidPath);
    }

    tokio::fs::remove_file(&path)
        .await
        .map_err(CommandError::from_fs)?;
    info!("Deleted {} for {}", path.display(), session.peer_addr);
    Ok(Reply::new(250, "File deleted."))
}
