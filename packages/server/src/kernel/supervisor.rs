//! Worker pool supervisor: OS-process parallelism with restart-on-exit.
//!
//! The parent process forks N copies of the current executable, each marked
//! with `WORKER_INDEX`. Children are full HTTP-facing instances sharing the
//! listen port via `SO_REUSEPORT`; they coordinate only through the backing
//! store. A child that exits is immediately replaced. There is no graceful
//! handoff of in-flight jobs — that is the recovery controller's job, run
//! separately.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::config::Config;

/// Environment variable marking a process as a pool worker.
pub const WORKER_INDEX_ENV: &str = "WORKER_INDEX";

/// Whether this process was forked by the supervisor.
pub fn worker_index() -> Option<usize> {
    std::env::var(WORKER_INDEX_ENV)
        .ok()
        .and_then(|raw| raw.parse().ok())
}

/// Bind a listener that siblings can share.
///
/// `SO_REUSEPORT` lets every worker process accept on the same address; the
/// kernel balances incoming connections across them.
pub fn bind_shared(addr: SocketAddr) -> Result<std::net::TcpListener> {
    let domain = Domain::for_address(addr);
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
        .context("failed to create listen socket")?;

    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket
        .bind(&addr.into())
        .with_context(|| format!("failed to bind {addr}"))?;
    socket.listen(1024)?;

    Ok(socket.into())
}

/// Fork the worker pool and keep every slot occupied until shutdown.
pub async fn run(config: &Config) -> Result<()> {
    let workers = config.worker_count();
    let exe = std::env::current_exe().context("failed to resolve current executable")?;

    info!(workers, "starting worker pool");

    let mut slots = Vec::with_capacity(workers);
    for index in 0..workers {
        let exe = exe.clone();
        slots.push(tokio::spawn(async move {
            loop {
                let child = Command::new(&exe)
                    .env(WORKER_INDEX_ENV, index.to_string())
                    .kill_on_drop(true)
                    .spawn();

                let mut child = match child {
                    Ok(child) => child,
                    Err(e) => {
                        error!(index, error = %e, "failed to spawn worker");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                };

                info!(index, pid = ?child.id(), "worker started");

                match child.wait().await {
                    Ok(status) => {
                        warn!(index, %status, "worker exited, restarting")
                    }
                    Err(e) => error!(index, error = %e, "failed to wait on worker"),
                }

                // Brief pause so a crash-looping worker does not spin.
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }));
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down worker pool");

    for slot in &slots {
        slot.abort();
    }

    Ok(())
}
