use log::warn;
use tokio::io::AsyncWriteExt;

use crate::core_ftpcommand::handlers::{open_data_channel, sandbox_roots};
use crate::core_ftpcommand::Reply;
use crate::core_sandbox;
use crate::core_transfer::listing;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;

/// Handles LIST (long form) and NLST (names only).
///
/// The listing is rendered before the preliminary 150 so a bad path fails
/// with a single 550 and never consumes the data channel.
pub async fn handle_list_command(
    session: &mut Session,
    ctx: &ServerContext,
    arg: &str,
    long: bool,
) -> Result<Reply, CommandError> {
    // Clients habitually pass ls-style flags; only the path matters here.
    let path_arg = arg
        .split_whitespace()
        .find(|token| !token.starts_with('-'))
        .unwrap_or("");

    let (cwd, home) = sandbox_roots(session)?;
    let target = core_sandbox::resolve(&cwd, &home, path_arg)?;

    let payload = if long {
        listing::long_listing(&target)
    } else {
        listing::short_listing(&target)
    }
    .map_err(CommandError::from_fs)?;

    session
        .send_reply(&Reply::new(150, "Here comes the directory listing."))
        .await?;

    let mut stream = open_data_channel(session, ctx).await?;
    let result = async {
        stream.write_all(payload.as_bytes()).await?;
        stream.shutdown().await
    }
    .await;

    match result {
        Ok(()) => Ok(Reply::new(226, "Directory send OK.")),
        Err(e) => {
            warn!("Listing transfer to {} failed: {}", session.peer_addr, e);
            Err(CommandError::TransferAborted)
        }
    }
}
