use log::{info, warn};

use crate::core_ftpcommand::Reply;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::{AuthStage, Session};

/// Handles the PASS command.
///
/// On success the user's home is canonicalized once and becomes both the
/// sandbox root and the initial working directory. A failed attempt drops
/// the session back to the start of the login exchange.
pub async fn handle_pass_command(
    session: &mut Session,
    ctx: &ServerContext,
    arg: &str,
) -> Result<Reply, CommandError> {
    let username = match &session.auth {
        AuthStage::AwaitingPass(username) => username.clone(),
        AuthStage::AwaitingUser => {
            return Err(CommandError::BadSequence(String::from(
                "Login with USER first.",
            )));
        }
        AuthStage::Authenticated(_) => {
            return Ok(Reply::new(230, "Already logged in."));
        }
    };

    if !ctx.users.verify(&username, arg) {
        warn!(
            "Failed login attempt for user {} from {}",
            username, session.peer_addr
        );
        session.auth = AuthStage::AwaitingUser;
        return Ok(Reply::new(530, "Login incorrect."));
    }

    let Some(mut user) = ctx.users.lookup(&username) else {
        session.auth = AuthStage::AwaitingUser;
        return Ok(Reply::new(530, "Login incorrect."));
    };

    if !user.enabled {
        warn!("Login refused for disabled account {}", username);
        session.auth = AuthStage::AwaitingUser;
        return Ok(Reply::new(530, "Login incorrect."));
    }

    let home = tokio::fs::canonicalize(&user.home).await.map_err(|e| {
        warn!(
            "Home directory for {} is unusable ({}): {}",
            username,
            user.home.display(),
            e
        );
        CommandError::LocalError
    })?;

    user.home = home.clone();
    session.cwd = home;
    session.auth = AuthStage::Authenticated(user);
    info!("User {} authenticated from {}", username, session.peer_addr);
    Ok(Reply::new(230, "User logged in, proceed."))
}
