use crate::core_ftpcommand::handlers::sandbox_roots;
use crate::core_ftpcommand::Reply;
use crate::core_sandbox;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;

/// Handles the CWD command. The target must resolve inside the sandbox and
/// be a directory; on failure the working directory is left untouched.
pub async fn handle_cwd_command(
    session: &mut Session,
    _ctx: &ServerContext,
    arg: &str,
) -> Result<Reply, CommandError> {
    let (cwd, home) = sandbox_roots(session)?;
    let target = core_sandbox::resolve(&cwd, &home, arg)?;

    let metadata = tokio::fs::metadata(&target)
        .await
        .map_err(CommandError::from_fs)?;
    if !metadata.is_dir() {
        return Err(CommandError::InvalidPath);
    }

    session.cwd = target;
    Ok(Reply::new(250, "Directory successfully changed."))
}
