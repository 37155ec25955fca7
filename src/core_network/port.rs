//! Active-mode (PORT) data channel setup.

use std::net::{Ipv4Addr, SocketAddrV4};

use log::debug;

use crate::constants::MIN_ACTIVE_PORT;
use crate::core_ftpcommand::Reply;
use crate::core_network::data::DataChannelSetup;
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;

/// Parses the RFC 959 `h1,h2,h3,h4,p1,p2` argument. Ports below 1024 are
/// refused to keep the server from being bounced into well-known services.
pub fn parse_port_argument(arg: &str) -> Result<SocketAddrV4, CommandError> {
    let parts: Vec<&str> = arg.split(',').map(str::trim).collect();
    if parts.len() != 6 {
        return Err(CommandError::Protocol(String::from(
            "Syntax error in parameters or arguments.",
        )));
    }

    let mut octets = [0u8; 6];
    for (slot, part) in octets.iter_mut().zip(&parts) {
        *slot = part
            .parse::<u8>()
            .map_err(|_| CommandError::Protocol(String::from("Invalid PORT argument.")))?;
    }

    let ip = Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]);
    let port = u16::from(octets[4]) * 256 + u16::from(octets[5]);
    if port < MIN_ACTIVE_PORT {
        return Err(CommandError::Protocol(String::from(
            "Refused: data port below 1024.",
        )));
    }

    Ok(SocketAddrV4::new(ip, port))
}

/// Handles the PORT command: records the client endpoint for a later
/// server-opened data connection. Any prior PASV or PORT setup is
/// discarded.
pub async fn handle_port_command(
    session: &mut Session,
    _ctx: &ServerContext,
    arg: &str,
) -> Result<Reply, CommandError> {
    let peer = parse_port_argument(arg)?;
    debug!("PORT target recorded: {}", peer);

    session.data_setup.discard();
    session.data_setup = DataChannelSetup::Active { peer };
    Ok(Reply::new(200, "PORT command successful."))
}
