//! Applies per-state admissibility and permission gates, then routes each
//! verb to its handler and writes the resulting reply.

use std::io;
use std::path::PathBuf;

use log::debug;

use crate::core_ftpcommand as cmd;
use crate::core_ftpcommand::{parse_line, FtpCommand};
use crate::core_network::{pasv, port};
use crate::error::CommandError;
use crate::server::ServerContext;
use crate::session::Session;
use crate::users::Permission;

/// What the session loop should do after a command completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Continue,
    Quit,
    /// The 234 reply has been sent; the loop must now run the TLS
    /// handshake on the control socket.
    StartTls,
}

pub async fn dispatch(
    session: &mut Session,
    ctx: &ServerContext,
    line: &str,
) -> io::Result<CommandOutcome> {
    let (verb, arg) = parse_line(line);
    if verb == "PASS" {
        debug!("{} -> PASS ****", session.peer_addr);
    } else {
        debug!("{} -> {}", session.peer_addr, line);
    }

    let Some(command) = FtpCommand::from_verb(&verb) else {
        let reply = CommandError::Unknown(verb).to_reply();
        session.send_reply(&reply).await?;
        return Ok(CommandOutcome::Continue);
    };

    if session.user().is_none() && !command.allowed_before_login() {
        session
            .send_reply(&CommandError::NotLoggedIn.to_reply())
            .await?;
        return Ok(CommandOutcome::Continue);
    }

    // A pending RNFR survives only until the next command unless that
    // command is the matching RNTO.
    if command != FtpCommand::RNTO {
        session.rename_from = None;
    }

    if let (Some(required), Some(user)) = (required_permission(command), session.user()) {
        if !user.permissions.allows(required) {
            session
                .send_reply(&CommandError::PermissionDenied.to_reply())
                .await?;
            return Ok(CommandOutcome::Continue);
        }
    }

    let result = match command {
        FtpCommand::USER => cmd::user::handle_user_command(session, ctx, &arg).await,
        FtpCommand::PASS => cmd::pass::handle_pass_command(session, ctx, &arg).await,
        FtpCommand::QUIT => cmd::quit::handle_quit_command(session, ctx, &arg).await,
        FtpCommand::NOOP => cmd::noop::handle_noop_command(session, ctx, &arg).await,
        FtpCommand::SYST => cmd::syst::handle_syst_command(session, ctx, &arg).await,
        FtpCommand::FEAT => cmd::feat::handle_feat_command(session, ctx, &arg).await,
        FtpCommand::AUTH => cmd::auth::handle_auth_command(session, ctx, &arg).await,
        FtpCommand::PBSZ => cmd::pbsz::handle_pbsz_command(session, ctx, &arg).await,
        FtpCommand::PROT => cmd::prot::handle_prot_command(session, ctx, &arg).await,
        FtpCommand::PWD => cmd::pwd::handle_pwd_command(session, ctx, &arg).await,
        FtpCommand::CWD => cmd::cwd::handle_cwd_command(session, ctx, &arg).await,
        FtpCommand::CDUP => cmd::cdup::handle_cdup_command(session, ctx, &arg).await,
        FtpCommand::TYPE => cmd::type_::handle_type_command(session, ctx, &arg).await,
        FtpCommand::MODE => cmd::mode::handle_mode_command(session, ctx, &arg).await,
        FtpCommand::PASV => pasv::handle_pasv_command(session, ctx, &arg).await,
        FtpCommand::PORT => port::handle_port_command(session, ctx, &arg).await,
        FtpCommand::LIST => cmd::list::handle_list_command(session, ctx, &arg, true).await,
        FtpCommand::NLST => cmd::list::handle_list_command(session, ctx, &arg, false).await,
        FtpCommand::RETR => cmd::retr::handle_retr_command(session, ctx, &arg).await,
        FtpCommand::STOR => cmd::stor::handle_stor_command(session, ctx, &arg, false).await,
        FtpCommand::APPE => cmd::stor::handle_stor_command(session, ctx, &arg, true).await,
        FtpCommand::REST => cmd::rest::handle_rest_command(session, ctx, &arg).await,
        FtpCommand::SIZE => cmd::size::handle_size_command(session, ctx, &arg).await,
        FtpCommand::MDTM => cmd::mdtm::handle_mdtm_command(session, ctx, &arg).await,
        FtpCommand::ALLO => cmd::allo::handle_allo_command(session, ctx, &arg).await,
        FtpCommand::DELE => cmd::dele::handle_dele_command(session, ctx, &arg).await,
        FtpCommand::MKD => cmd::mkd::handle_mkd_command(session, ctx, &arg).await,
        FtpCommand::RMD => cmd::rmd::handle_rmd_command(session, ctx, &arg).await,
        FtpCommand::RNFR => cmd::rnfr::handle_rnfr_command(session, ctx, &arg).await,
        FtpCommand::RNTO => cmd::rnto::handle_rnto_command(session, ctx, &arg).await,
    };

    match result {
        Ok(reply) => {
            let code = reply.code();
            session.send_reply(&reply).await?;
            Ok(match command {
                FtpCommand::QUIT => CommandOutcome::Quit,
                FtpCommand::AUTH if code == 234 => CommandOutcome::StartTls,
                _ => CommandOutcome::Continue,
            })
        }
        Err(CommandError::Fatal(e)) => Err(e),
        Err(e) => {
            session.send_reply(&e.to_reply()).await?;
            Ok(CommandOutcome::Continue)
        }
    }
}

/// The right a user must hold before the handler may touch the filesystem.
fn required_permission(command: FtpCommand) -> Option<Permission> {
    match command {
        FtpCommand::LIST | FtpCommand::NLST => Some(Permission::List),
        FtpCommand::RETR => Some(Permission::Download),
        FtpCommand::STOR => Some(Permission::Upload),
        FtpCommand::APPE => Some(Permission::Append),
        FtpCommand::DELE => Some(Permission::Delete),
        FtpCommand::MKD => Some(Permission::Mkdir),
        FtpCommand::RMD => Some(Permission::Rmdir),
        FtpCommand::RNFR | FtpCommand::RNTO => Some(Permission::Rename),
        FtpCommand::SIZE | FtpCommand::MDTM | FtpCommand::CWD | FtpCommand::CDUP => {
            Some(Permission::Read)
        }
        _ => None,
    }
}

/// Current directory and home of the authenticated user, for the sandbox.
pub fn sandbox_roots(session: &Session) -> Result<(PathBuf, PathBuf), CommandError> {
    let user = session.user().ok_or(CommandError::NotLoggedIn)?;
    Ok((session.cwd.clone(), user.home.clone()))
}

/// Turns the session's pending PASV/PORT setup into a live data stream,
/// TLS-wrapped when the protection level asks for it.
pub async fn open_data_channel(
    session: &mut Session,
    ctx: &ServerContext,
) -> Result<crate::core_network::DataStream, CommandError> {
    let tls = match session.protection {
        crate::session::ProtectionLevel::Private => ctx.tls.as_deref(),
        crate::session::ProtectionLevel::Clear => None,
    };
    let deadline =
        std::time::Duration::from_secs(crate::constants::DATA_CHANNEL_TIMEOUT_SECS);
    let stream = crate::core_network::data::obtain(&mut session.data_setup, deadline, tls).await?;
    Ok(stream)
}
