use crate::core_ftpcommand::Reply;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;

/// Handles the PBSZ command. Only a protection buffer size of zero is
/// meaningful over TLS, so any numeric argument is acknowledged as zero.
pub async fn handle_pbsz_command(
    session: &mut Session,
    _ctx: &ServerContext,
    arg: &str,
) -> Result<Reply, CommandError> {
    if !session.tls_active {
        return Err(CommandError::BadSequence(String::from(
            "PBSZ requires a secured control channel.",
        )));
    }
    if arg.parse::<u64>().is_err() {
        return Err(CommandError::Protocol(String::from(
            "Syntax error in parameters or arguments.",
        )));
    }
    session.pbsz_done = true;
    Ok(Reply::new(200, "PBSZ=0"))
}
