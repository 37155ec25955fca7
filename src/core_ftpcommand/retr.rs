use log::{info, warn};

use crate::core_ftpcommand::handlers::{open_data_channel, sandbox_roots};
use crate::core_ftpcommand::Reply;
use crate::core_sandbox;
use crate::core_transfer;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;

/// Handles the RETR command.
///
/// A pending REST offset is consumed here whether or not the transfer
/// succeeds. The data stream is closed by the engine; that close is the
/// client's EOF.
pub async fn handle_retr_command(
    session: &mut Session,
    ctx: &ServerContext,
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

    let offset = std::mem::take(&mut session.resume_offset);

    session
        .send_reply(&Reply::new(
            150,
            format!("Opening data connection for {} ({} bytes).", arg, metadata.len()),
        ))
        .await?;

    let mut stream = open_data_channel(session, ctx).await?;
    match core_transfer::send_file(&mut stream, &path, offset, session.transfer_type).await {
        Ok(bytes) => {
            session.record_download(bytes);
            info!("Sent {} ({} bytes) to {}", path.display(), bytes, session.peer_addr);
            Ok(Reply::new(226, "Transfer complete."))
        }
        Err(e) => {
            warn!("RETR of {} failed: {}", path.display(), e);
            Err(e.into())
        }
    }
}
