use crate::core_ftpcommand::Reply;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::{AuthStage, Session};

/// Handles the USER command.
///
/// Always answers 331 so the reply does not reveal whether the account
/// exists; verification happens on PASS. Issuing USER at any point restarts
/// the login exchange.
pub async fn handle_user_command(
    session: &mut Session,
    ctx: &ServerContext,
    arg: &str,
) -> Result<Reply, CommandError> {
    if arg.is_empty() {
        return Err(CommandError::Protocol(String::from(
            "Syntax error in parameters or arguments.",
        )));
    }

    if ctx.config.security.require_ssl && !session.tls_active {
        return Err(CommandError::BadSequence(String::from(
            "Secure the connection with AUTH TLS first.",
        )));
    }

    session.auth = AuthStage::AwaitingPass(arg.to_string());
    Ok(Reply::new(331, "User name okay, need password."))
}
