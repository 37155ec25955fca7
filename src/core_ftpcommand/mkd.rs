use crate::core_ftpcommand::handlers::sandbox_roots;
use crate::core_ftpcommand::Reply;
use crate::core_sandbox;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;

/// Handles the MKD command. Only the leaf directory is created; missing
/// ancestors are an error.
pub async fn handle_mkd_command(
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

    tokio::fs::create_dir(&path)
        .await
        .map_err(CommandError::from_fs)?;

    let wire = core_sandbox::to_wire_path(&home, &path);
    Ok(Reply::new(257, format!("\"{}\" created.", wire)))
}
