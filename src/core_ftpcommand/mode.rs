use crate::core_ftpcommand::Reply;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;

/// Handles the MODE command. Stream is the only transfer mode this server
/// implements; block and compressed are refused.
pub async fn handle_mode_command(
    _session: &mut Session,
    _ctx: &ServerContext,
    arg: &str,
) -> Result<Reply, CommandError> {
    match arg.to_ascii_uppercase().as_str() {
        "S" => Ok(Reply::new(200, "Mode set to S.")),
        _ => Err(CommandError::Unsupported(String::from(
            "Only stream mode is supported.",
        ))),
    }
}
