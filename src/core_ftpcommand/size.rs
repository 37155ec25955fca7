use crate::core_ftpcommand::handlers::sandbox_roots;
use crate::core_ftpcommand::Reply;
use crate::core_sandbox;
use crate::core_transfer::TransferType;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;

/// Handles the SIZE command. In ASCII type the on-the-wire size depends on
/// line-ending translation, so the request is refused rather than answered
/// with a number that will not match the transfer.
pub async fn handle_size_command(
    session: &mut Session,
    _ctx: &ServerContext,
    arg: &str,
) -> Result<Reply, CommandError> {
    if arg.is_empty() {
        return Err(CommandError::Protocol(String::from(
            "Syntax error in parameters or arguments.",
        )));
    }
    if session.transfer_type == TransferType::Ascii {
        return Err(CommandError::InvalidPath);
    }

    let (cwd, home) = sandbox_roots(session)?;
    let path = core_sandbox::resolve(&cwd, &home, arg)?;
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(CommandError::from_fs)?;
    if !metadata.is_file() {
        return Err(CommandError::NotFound);
    }

    Ok(Reply::new(213, metadata.len().to_string()))
}
