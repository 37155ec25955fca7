use crate::core_ftpcommand::cwd::handle_cwd_command;
use crate::core_ftpcommand::Reply;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;

/// Handles the CDUP command as `CWD ..`; at the virtual root it stays put.
pub async fn handle_cdup_command(
    session: &mut Session,
    ctx: &ServerContext,
    _arg: &str,
) -> Result<Reply, CommandError> {
    handle_cwd_command(session, ctx, "..").await
}
