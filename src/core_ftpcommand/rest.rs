use crate::core_ftpcommand::Reply;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;

/// Handles the REST command. The offset applies to the next RETR or STOR
/// and is consumed there; APPE ignores it.
pub async fn handle_rest_command(
    session: &mut Session,
    _ctx: &ServerContext,
    arg: &str,
) -> Result<Reply, CommandError> {
    let offset: u64 = arg.parse().map_err(|_| {
        CommandError::Protocol(String::from("REST requires a byte offset."))
    })?;

    session.resume_offset = offset;
    Ok(Reply::new(
        350,
        format!("Restarting at {}. Send RETR or STOR.", offset),
    ))
}
