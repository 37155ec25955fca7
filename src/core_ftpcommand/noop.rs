use crate::core_ftpcommand::Reply;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;

pub async fn handle_noop_command(
    _session: &mut Session,
    _ctx: &ServerContext,
    _arg: &str,
) -> Result<Reply, CommandError> {
    Ok(Reply::new(200, "OK."))
}
