use crate::core_ftpcommand::Reply;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::{ProtectionLevel, Session};

/// Handles the PROT command. `S` and `E` are accepted and treated as
/// Private, matching common server practice.
pub async fn handle_prot_command(
    session: &mut Session,
    _ctx: &ServerContext,
    arg: &str,
) -> Result<Reply, CommandError> {
    if !session.tls_active {
        return Err(CommandError::BadSequence(String::from(
            "PROT requires a secured control channel.",
        )));
    }
    if !session.pbsz_done {
        return Err(CommandError::BadSequence(String::from(
            "Issue PBSZ first.",
        )));
    }

    match arg.to_ascii_uppercase().as_str() {
        "C" => {
            session.protection = ProtectionLevel::Clear;
            Ok(Reply::new(200, "Protection level set to C."))
        }
        "P" | "S" | "E" => {
            session.protection = ProtectionLevel::Private;
            Ok(Reply::new(200, "Protection level set to P."))
        }
        _ => Err(CommandError::Unsupported(String::from(
            "Unknown protection level.",
        ))),
    }
}
