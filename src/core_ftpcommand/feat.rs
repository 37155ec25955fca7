use crate::core_ftpcommand::Reply;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;

/// Handles the FEAT command. The advertised set matches what the
/// dispatcher actually implements.
pub async fn handle_feat_command(
    _session: &mut Session,
    _ctx: &ServerContext,
    _arg: &str,
) -> Result<Reply, CommandError> {
    let lines = vec![
        String::from("Features:"),
        String::from(" AUTH TLS"),
        String::from(" PBSZ"),
        String::from(" PROT"),
        String::from(" SIZE"),
        String::from(" REST STREAM"),
        String::from(" APPE"),
    ];
    Ok(Reply::multi(211, lines, "End"))
}
