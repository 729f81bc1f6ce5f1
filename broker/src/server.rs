// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use crate::auth::Authenticator;
use crate::config::Config;
use crate::connection::Connection;
use crate::dispatcher::{Dispatcher, DispatcherConfig};
use crate::error::Error;

/// Binds the listener, spawns the dispatcher task, accepts connections and spawns one
/// task per connection, and blocks until a shutdown signal arrives (C10).
///
/// # Errors
///
/// Returns an error if the listen socket cannot be bound.
pub async fn run(config: Arc<Config>, authenticator: Arc<dyn Authenticator>) -> Result<(), Error> {
    let bind_addr = config.listener.bind_addr();
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("listening on {bind_addr}");

    let (to_dispatcher, from_sessions) = mpsc::channel(1024);
    let dispatcher_config = DispatcherConfig {
        max_inflight_messages: config.general.max_inflight_messages(),
        pub_ack_timeout: Duration::from_millis(config.general.pub_ack_timeout_ms()),
        pub_max_retries: config.general.pub_max_retries(),
        maximum_qos: config.general.maximum_qos(),
    };
    let dispatcher = Dispatcher::new(dispatcher_config);
    let dispatcher_task = tokio::spawn(dispatcher.run(from_sessions));

    let next_session_id = Arc::new(AtomicU64::new(1));
    let connect_timeout = Duration::from_millis(config.general.connect_timeout_ms());
    let rbuf_size = config.listener.conn_rbuf_size();

    let accept_task = {
        let to_dispatcher = to_dispatcher.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((socket, addr)) => {
                        let session_id = next_session_id.fetch_add(1, Ordering::Relaxed);
                        info!("accepted connection {addr} as session {session_id}");
                        let connection = Connection::new(
                            session_id,
                            socket,
                            rbuf_size,
                            connect_timeout,
                            to_dispatcher.clone(),
                            authenticator.clone(),
                        );
                        tokio::spawn(connection.run());
                    }
                    Err(err) => {
                        error!("accept failed: {err}");
                    }
                }
            }
        })
    };

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping");
    accept_task.abort();
    let _ = to_dispatcher.send(crate::commands::SessionToDispatcherCmd::Shutdown).await;
    if let Err(err) = dispatcher_task.await {
        error!("dispatcher task did not shut down cleanly: {err}");
    }
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigquit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");
    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
        _ = sigquit.recv() => {}
    }
}
