//! Passive-mode (PASV) data channel setup.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use log::{debug, warn};
use tokio::net::{TcpListener, TcpSocket};

use crate::core_ftpcommand::Reply;
use crate::core_network::data::{BrokerError, DataChannelSetup};
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;

/// Binds a single-use listener to any free port in `range` (inclusive).
pub async fn open_passive(
    bind_ip: IpAddr,
    range: (u16, u16),
) -> Result<(TcpListener, u16), BrokerError> {
    let (start, end) = range;
    for port in start..=end {
        let socket = match bind_ip {
            IpAddr::V4(_) => TcpSocket::new_v4()?,
            IpAddr::V6(_) => TcpSocket::new_v6()?,
        };
        match socket.bind(SocketAddr::new(bind_ip, port)) {
            Ok(()) => {}
            Err(_) => continue,
        }
        match socket.listen(1) {
            Ok(listener) => {
                let port = listener.local_addr()?.port();
                debug!("Passive listener bound on {}:{}", bind_ip, port);
                return Ok((listener, port));
            }
            Err(_) => continue,
        }
    }
    Err(BrokerError::NoFreePort)
}

/// Formats the RFC 959 `227` reply body.
pub fn format_pasv_reply(ip: Ipv4Addr, port: u16) -> String {
    let octets = ip.octets();
    format!(
        "Entering Passive Mode ({},{},{},{},{},{}).",
        octets[0],
        octets[1],
        octets[2],
        octets[3],
        port / 256,
        port % 256
    )
}

/// Handles the PASV command: binds a listener in the configured port range
/// and advertises it to the client. Any prior PASV or PORT setup is
/// discarded.
pub async fn handle_pasv_command(
    session: &mut Session,
    ctx: &ServerContext,
    _arg: &str,
) -> Result<Reply, CommandError> {
    session.data_setup.discard();

    let advertised = advertised_ip(session, ctx)?;
    let range = (
        ctx.config.connection.passive_port_range_start,
        ctx.config.connection.passive_port_range_end,
    );

    let (listener, port) = open_passive(IpAddr::V4(Ipv4Addr::UNSPECIFIED), range)
        .await
        .map_err(|e| {
            warn!("PASV bind failed: {}", e);
            CommandError::from(e)
        })?;

    let reply = Reply::new(227, format_pasv_reply(advertised, port));
    session.data_setup = DataChannelSetup::Passive { listener, port };
    Ok(reply)
}

/// The address placed in the 227 reply: the configured external IP when
/// set, otherwise the control socket's local address.
fn advertised_ip(session: &Session, ctx: &ServerContext) -> Result<Ipv4Addr, CommandError> {
    let external = &ctx.config.passive.external_ip;
    if !external.is_empty() {
        return external.parse().map_err(|_| {
            warn!("passive.external_ip is not a valid IPv4 address: {}", external);
            CommandError::DataChannelFailed
        });
    }
    match session.local_addr.ip() {
        IpAddr::V4(ip) => Ok(ip),
        IpAddr::V6(_) => {
            warn!("PASV on an IPv6 control connection requires passive.external_ip");
            Err(CommandError::DataChannelFailed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pasv_reply_encodes_port_in_two_octets() {
        let reply = format_pasv_reply(Ipv4Addr::new(127, 0, 0, 1), 50123);
        assert_eq!(
            reply,
            format!(
                "Entering Passive Mode (127,0,0,1,{},{}).",
                50123 / 256,
                50123 % 256
            )
        );
        // Round trip: p1 * 256 + p2 == port.
        assert_eq!((50123 / 256) * 256 + 50123 % 256, 50123);
    }

    #[tokio::test]
    async fn open_passive_honors_range_of_one() {
        // Find a free port first, then demand exactly that one.
        let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let (listener, chosen) =
            open_passive(IpAddr::V4(Ipv4Addr::LOCALHOST), (port, port))
                .await
                .unwrap();
        assert_eq!(chosen, port);
        drop(listener);
    }

    #[tokio::test]
    async fn open_passive_fails_when_range_is_busy() {
        let holder = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = holder.local_addr().unwrap().port();

        let result = open_passive(IpAddr::V4(Ipv4Addr::LOCALHOST), (port, port)).await;
        assert!(matches!(result, Err(BrokerError::NoFreePort)));
    }
}
