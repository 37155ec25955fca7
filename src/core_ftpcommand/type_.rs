use crate::core_ftpcommand::Reply;
use crate::core_transfer::TransferType;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;

/// Handles the TYPE command. Only ASCII and Image are supported; the
/// optional ASCII format parameter `N` is tolerated.
pub async fn handle_type_command(
    session: &mut Session,
    _ctx: &ServerContext,
    arg: &str,
) -> Result<Reply, CommandError> {
    match arg.to_ascii_uppercase().as_str() {
        "A" | "A N" => {
            session.transfer_type = TransferType::Ascii;
            Ok(Reply::new(200, "Type set to A."))
        }
        "I" => {
            session.transfer_type = TransferType::Image;
            Ok(Reply::new(200, "Type set to I."))
        }
        _ => Err(CommandError::Unsupported(String::from(
            "Only types A and I are supported.",
        ))),
    }
}
