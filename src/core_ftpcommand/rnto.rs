use log::info;

use crate::core_ftpcommand::handlers::sandbox_roots;
use crate::core_ftpcommand::Reply;
use crate::core_sandbox;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;

/// Handles the RNTO command. Both endpoints of the rename were or are
/// vetted by the sandbox; the pending source is consumed either way.
pub async fn handle_rnto_command(
    session: &mut Session,
    _ctx: &ServerContext,
    arg: &str,
) -> Result<Reply, CommandError> {
    let Some(source) = session.rename_from.take() else {
        return Err(CommandError::BadSequence(String::from(
            "RNFR required first.",
        )));
    };

    if arg.is_empty() {
        return Err(CommandError::Protocol(String::from(
            "Syntax error in parameters or arguments.",
        )));
    }

    let (cwd, home) = sandbox_roots(session)?;
    let target = core_sandbox::resolve(&cwd, &home, arg)?;

    tokio::fs::rename(&source, &target)
        .await
        .map_err(CommandError::from_fs)?;
    info!(
        "Renamed {} -> {} for {}",
        source.display(),
        target.display(),
        session.peer_addr
    );
    Ok(Reply::new(250, "Rename successful."))
}
