use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Builder, Env};
use log::{info, warn};

use ferroftpd::config::{Config, UserConfig};
use ferroftpd::constants::PID_FILE;
use ferroftpd::core_cli::{Cli, Command, UserAction};
use ferroftpd::Server;

fn main() -> Result<()> {
    let args = Cli::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_filter))
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            writeln!(
                buf,
                "[{}] [{}] {}",
                timestamp,
                record.level(),
                record.args()
            )
        })
        .init();

    match args.command.unwrap_or(Command::Start) {
        Command::Start => start(&args.config),
        Command::Stop => stop(),
        Command::Restart => {
            if let Err(e) = stop() {
                warn!("No server to stop: {}", e);
            }
            start(&args.config)
        }
        Command::Status => status(),
        Command::Reload => reload(),
        Command::TestConfig | Command::Validate => test_config(&args.config),
        Command::User { action } => manage_users(&args.config, action),
    }
}

fn start(config_path: &Path) -> Result<()> {
    let config = Config::load_from_file(config_path)?;
    info!("Starting {} with config {}", config.server_name, config_path.display());

    let runtime = tokio::runtime::Runtime::new().context("Failed to start the runtime")?;
    runtime.block_on(async {
        let mut server = Server::new(config)?;
        let shutdown = server.shutdown_notify();

        let pid_path = write_pid_file()?;
        tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            shutdown.notify_waiters();
        });

        let result = server.run().await;
        let _ = fs::remove_file(&pid_path);
        result
    })
}

/// Blocks until SIGTERM or SIGINT. SIGHUP is acknowledged but only logged;
/// a configuration reload is restart-equivalent.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                return std::future::pending().await;
            }
        };
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to install SIGINT handler: {}", e);
                return std::future::pending().await;
            }
        };
        let mut sighup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to install SIGHUP handler: {}", e);
                return std::future::pending().await;
            }
        };

        loop {
            tokio::select! {
                _ = sigterm.recv() => break,
                _ = sigint.recv() => break,
                _ = sighup.recv() => {
                    warn!("SIGHUP received; reload is restart-equivalent, restart to apply config changes");
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(unix)]
fn stop() -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pid = read_pid_file()?;
    kill(Pid::from_raw(pid), Signal::SIGTERM)
        .with_context(|| format!("Failed to signal pid {}", pid))?;
    info!("Sent SIGTERM to pid {}", pid);
    Ok(())
}

#[cfg(unix)]
fn status() -> Result<()> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let pid = read_pid_file()?;
    kill(Pid::from_raw(pid), None)
        .map_err(|_| anyhow::anyhow!("Stale PID file: no process with pid {}", pid))?;
    println!("ferroftpd is running (pid {})", pid);
    Ok(())
}

#[cfg(unix)]
fn reload() -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pid = read_pid_file()?;
    kill(Pid::from_raw(pid), Signal::SIGHUP)
        .with_context(|| format!("Failed to signal pid {}", pid))?;
    info!("Sent SIGHUP to pid {} (reload is restart-equivalent)", pid);
    Ok(())
}

#[cfg(not(unix))]
fn stop() -> Result<()> {
    anyhow::bail!("stop is only supported on unix")
}

#[cfg(not(unix))]
fn status() -> Result<()> {
    anyhow::bail!("status is only supported on unix")
}

#[cfg(not(unix))]
fn reload() -> Result<()> {
    anyhow::bail!("reload is only supported on unix")
}

fn test_config(config_path: &Path) -> Result<()> {
    let config = Config::load_from_file(config_path)?;
    println!(
        "Configuration OK: {} on {}:{}, {} user(s)",
        config.server_name,
        config.connection.bind_address,
        config.connection.bind_port,
        config.users.len()
    );
    Ok(())
}

fn manage_users(config_path: &Path, action: UserAction) -> Result<()> {
    let mut config = Config::load_from_file(config_path)?;
    match action {
        UserAction::Add {
            username,
            password,
            home,
            permissions,
        } => {
            if config.users.iter().any(|u| u.username == username) {
                anyhow::bail!("User {} already exists", username);
            }
            let password_hash = bcrypt::hash(&password, bcrypt::DEFAULT_COST)
                .context("Failed to hash password")?;
            config.users.push(UserConfig {
                username: username.clone(),
                password_hash,
                home,
                permissions,
                enabled: true,
            });
            config.save_to_file(config_path)?;
            println!("Added user {}", username);
        }
        UserAction::Remove { username } => {
            let before = config.users.len();
            config.users.retain(|u| u.username != username);
            if config.users.len() == before {
                anyhow::bail!("No such user: {}", username);
            }
            config.save_to_file(config_path)?;
            println!("Removed user {}", username);
        }
        UserAction::List => {
            for user in &config.users {
                let status = if user.enabled { "" } else { " (disabled)" };
                println!("{}\t{}{}", user.username, user.home.display(), status);
            }
        }
    }
    Ok(())
}

/// The system location first, then a scratch fallback for unprivileged
/// runs. Readers probe in the same order.
fn pid_file_candidates() -> [PathBuf; 2] {
    [
        PathBuf::from(PID_FILE),
        std::env::temp_dir().join("ferroftpd.pid"),
    ]
}

fn write_pid_file() -> Result<PathBuf> {
    let pid = std::process::id().to_string();
    let candidates = pid_file_candidates();
    for path in &candidates {
        if fs::write(path, &pid).is_ok() {
            return Ok(path.clone());
        }
    }
    anyhow::bail!(
        "Failed to write a PID file (tried {} and {})",
        candidates[0].display(),
        candidates[1].display()
    )
}

#[cfg(unix)]
fn read_pid_file() -> Result<i32> {
    for path in pid_file_candidates() {
        if let Ok(contents) = fs::read_to_string(&path) {
            return contents
                .trim()
                .parse()
                .with_context(|| format!("Malformed PID file {}", path.display()));
        }
    }
    anyhow::bail!("No PID file found; is the server running?")
}
