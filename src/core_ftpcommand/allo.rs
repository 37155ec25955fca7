use crate::core_ftpcommand::Reply;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;

/// Handles the ALLO command. Storage is not preallocated; the command is
/// acknowledged as superfluous per RFC 959.
pub async fn handle_allo_command(
    _session: &mut Session,
    _ctx: &ServerContext,
    _arg: &str,
) -> Result<Reply, CommandError> {
    Ok(Reply::new(202, "ALLO command ignored."))
}
