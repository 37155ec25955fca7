use crate::core_ftpcommand::Reply;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;

/// Handles the AUTH command (RFC 4217 explicit FTPS).
///
/// On success the 234 reply is written by the dispatcher and the session
/// loop performs the actual handshake; a failed handshake terminates the
/// session since the client cannot be assumed to resume in plaintext.
pub async fn handle_auth_command(
    session: &mut Session,
    ctx: &ServerContext,
    arg: &str,
) -> Result<Reply, CommandError> {
    let mechanism = arg.to_ascii_uppercase();
    if mechanism != "TLS" && mechanism != "SSL" {
        return Err(CommandError::Unsupported(String::from(
            "Unknown security mechanism.",
        )));
    }
    if session.tls_active {
        return Ok(Reply::new(534, "Control channel is already secured."));
    }
    if ctx.tls.is_none() {
        return Err(CommandError::TlsUnavailable);
    }
    Ok(Reply::new(234, "AUTH TLS successful."))
}
