//! Accepts control connections, gates them through the IP ACL and the
//! connection cap, and hands each admitted client to its own session task.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::Notify;

use crate::config::Config;
use crate::core_acl::{IpAcl, ListAcl};
use crate::core_tls::{TlsConfig, TlsContext};
use crate::session::Session;
use crate::supervisor::Supervisor;
use crate::users::{InMemoryUserDirectory, UserDirectory};

/// Read-only collaborators a session needs while it runs. Shared by Arc;
/// nothing here is mutated after startup.
pub struct ServerContext {
    pub config: Arc<Config>,
    pub users: Arc<dyn UserDirectory>,
    pub tls: Option<Arc<TlsContext>>,
}

pub struct Server {
    ctx: Arc<ServerContext>,
    acl: Arc<dyn IpAcl>,
    supervisor: Arc<Supervisor>,
    shutdown: Arc<Notify>,
    listener: Option<TcpListener>,
}

impl Server {
    pub fn new(config: Config) -> Result<Server> {
        config.validate()?;
        let config = Arc::new(config);

        let users: Arc<dyn UserDirectory> =
            Arc::new(InMemoryUserDirectory::from_config(&config));
        let acl: Arc<dyn IpAcl> = Arc::new(ListAcl::from_config(&config.acl));

        // A broken TLS setup disables FTPS but not the server itself;
        // AUTH TLS is answered with 534 until the operator fixes it.
        let tls = match TlsConfig::from_security(&config.security) {
            None => None,
            Some(tls_config) => match TlsContext::new(&tls_config) {
                Ok(context) => {
                    info!("TLS context loaded from {}", tls_config.cert_file.display());
                    Some(Arc::new(context))
                }
                Err(e) => {
                    error!("TLS support disabled: {}", e);
                    None
                }
            },
        };
        if config.security.require_ssl && tls.is_none() {
            warn!("require_ssl is set but no TLS context is available; logins will be refused");
        }

        let supervisor = Arc::new(Supervisor::new(
            config.connection.max_connections,
            Duration::from_secs(u64::from(config.connection.timeout_seconds)),
            config.connection.pool_size,
        ));

        Ok(Server {
            ctx: Arc::new(ServerContext {
                config: Arc::clone(&config),
                users,
                tls,
            }),
            acl,
            supervisor,
            shutdown: Arc::new(Notify::new()),
            listener: None,
        })
    }

    /// Clone of the shutdown trigger, for signal handlers.
    pub fn shutdown_notify(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    /// Binds the control listener and, when configured, drops privileges.
    /// Returns the bound address (useful when the port was 0).
    pub async fn bind(&mut self) -> Result<SocketAddr> {
        let connection = &self.ctx.config.connection;
        let ip: IpAddr = connection
            .bind_address
            .parse()
            .with_context(|| format!("Invalid bind address: {}", connection.bind_address))?;
        let addr = SocketAddr::new(ip, connection.bind_port);

        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        socket.set_reuseaddr(true)?;
        socket
            .bind(addr)
            .with_context(|| format!("Failed to bind {}", addr))?;
        let listener = socket.listen(connection.max_connections)?;
        let local = listener.local_addr()?;
        info!("Listening on {}", local);

        if self.ctx.config.security.drop_privileges {
            drop_privileges(
                &self.ctx.config.security.run_as_user,
                &self.ctx.config.security.run_as_group,
            )?;
        }

        self.listener = Some(listener);
        Ok(local)
    }

    /// Accept loop. Runs until the shutdown notify fires, then stops every
    /// session and waits for their tasks.
    pub async fn serve(&mut self) -> Result<()> {
        let listener = self
            .listener
            .take()
            .context("serve() called before bind()")?;

        let reaper = Arc::clone(&self.supervisor).start_reaper();
        let pool_maintenance = Arc::clone(&self.supervisor).start_pool_maintenance();

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("Shutdown requested");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.handle_accept(stream, peer),
                        Err(e) => warn!("Accept failed: {}", e),
                    }
                }
            }
        }

        reaper.abort();
        pool_maintenance.abort();
        self.supervisor.shutdown().await;
        Ok(())
    }

    pub async fn run(&mut self) -> Result<()> {
        self.bind().await?;
        self.serve().await
    }

    fn handle_accept(&self, stream: TcpStream, peer: SocketAddr) {
        if !self.acl.is_allowed(peer.ip()) {
            info!("Connection from {} denied by ACL", peer);
            return;
        }

        let handle = match self.supervisor.admit(peer) {
            Ok(handle) => handle,
            Err(_) => {
                // Closed without a banner; the client sees a bare RST/EOF.
                warn!("Connection from {} refused: at capacity", peer);
                return;
            }
        };

        let local_addr = match stream.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                warn!("Dropping connection from {}: {}", peer, e);
                self.supervisor.remove(handle.id);
                return;
            }
        };

        info!("New connection from {}", peer);
        let session = Session::new(stream, peer, local_addr, Arc::clone(&handle));
        let ctx = Arc::clone(&self.ctx);
        let supervisor = Arc::clone(&self.supervisor);
        let id = handle.id;
        let task = tokio::spawn(async move {
            session.run(ctx).await;
            supervisor.remove(id);
        });
        self.supervisor.attach_task(id, task);
    }
}

/// setgid before setuid, once, right after a successful bind.
#[cfg(unix)]
fn drop_privileges(run_as_user: &str, run_as_group: &str) -> Result<()> {
    use nix::unistd::{setgid, setuid, Group, User};

    if !run_as_group.is_empty() {
        let group = Group::from_name(run_as_group)
            .with_context(|| format!("Failed to look up group {}", run_as_group))?
            .with_context(|| format!("Unknown group: {}", run_as_group))?;
        setgid(group.gid).with_context(|| format!("setgid({}) failed", group.gid))?;
    }
    if !run_as_user.is_empty() {
        let user = User::from_name(run_as_user)
            .with_context(|| format!("Failed to look up user {}", run_as_user))?
            .with_context(|| format!("Unknown user: {}", run_as_user))?;
        setuid(user.uid).with_context(|| format!("setuid({}) failed", user.uid))?;
        info!("Dropped privileges to {}:{}", run_as_user, run_as_group);
    }
    Ok(())
}

#[cfg(not(unix))]
fn drop_privileges(_run_as_user: &str, _run_as_group: &str) -> Result<()> {
    anyhow::bail!("drop_privileges is only supported on unix")
}
