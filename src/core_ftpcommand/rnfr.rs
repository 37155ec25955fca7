use crate::core_ftpcommand::handlers::sandbox_roots;
use crate::core_ftpcommand::Reply;
use crate::core_sandbox;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;

/// Handles the RNFR command. The resolved source is parked on the session;
/// any following command other than RNTO clears it.
pub async fn handle_rnfr_command(
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
    if tokio::fs::symlink_metadata(&path).await.is_err() {
        return Err(CommandError::NotFound);
    }

    session.rename_from = Some(path);
    Ok(Reply::new(350, "Ready for RNTO."))
}
