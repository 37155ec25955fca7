use log::{info, warn};

use crate::core_ftpcommand::handlers::{open_data_channel, sandbox_roots};
use crate::core_ftpcommand::Reply;
use crate::core_sandbox;
use crate::core_transfer;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;

/// Handles STOR and, with `append`, APPE.
///
/// The target may not exist yet; the sandbox vets the composed path either
/// way. APPE always writes to the end and ignores any REST offset. A
/// transfer that dies partway leaves the partial file in place so the
/// client can resume.
pub async fn handle_stor_command(
    session: &mut Session,
    ctx: &ServerContext,
    arg: &str,
    append: bool,
) -> Result<Reply, CommandError> {
    if arg.is_empty() {
        return Err(CommandError::Protocol(String::from(
            "Syntax error in parameters or arguments.",
        )));
    }

    let (cwd, home) = sandbox_roots(session)?;
    let path = core_sandbox::resolve(&cwd, &home, arg)?;
    if let Some(parent) = path.parent() {
        if !parent.is_dir() {
            return Err(CommandError::NotFound);
        }
    }

    let offset = std::mem::take(&mut session.resume_offset);
    let offset = if append { 0 } else { offset };

    session
        .send_reply(&Reply::new(
            150,
            "File status okay; about to open data connection.",
        ))
        .await?;

    let mut stream = open_data_channel(session, ctx).await?;
    match core_transfer::recv_file(&mut stream, &path, offset, session.transfer_type, append).await
    {
        Ok(bytes) => {
            session.record_upload(bytes);
            info!(
                "Stored {} ({} bytes) from {}",
                path.display(),
                bytes,
                session.peer_addr
            );
            Ok(Reply::new(226, "Transfer complete."))
        }
        Err(e) => {
            warn!("Upload to {} failed: {}", path.display(), e);
            Err(e.into())
        }
    }
}
