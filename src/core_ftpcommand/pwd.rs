use crate::core_ftpcommand::handlers::sandbox_roots;
use crate::core_ftpcommand::Reply;
use crate::core_sandbox;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;

/// Handles the PWD command. The reply shows the virtual path, never the
/// host path.
pub async fn handle_pwd_command(
    session: &mut Session,
    _ctx: &ServerContext,
    _arg: &str,
) -> Result<Reply, CommandError> {
    let (cwd, home) = sandbox_roots(session)?;
    let wire = core_sandbox::to_wire_path(&home, &cwd);
    Ok(Reply::new(257, format!("\"{}\" is the current directory.", wire)))
}
