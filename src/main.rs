/*!
 * OSA Kernel - Demo Entry Point
 *
 * Runs an echo server task and a client on loopback:
 * - the server task accepts a peer, queues what it receives and echoes it back
 * - the client connects, sends a fixed-size message and reads the echo
 * - the main thread drains the message queue and shuts the tasks down
 */

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use osa_kernel::{
    init_tracing, ComMode, ComProtocol, Connection, Endpoint, MessagePriority, MessageQueue,
    NetConfig, Outcome, Server, ServerAttributes, SharedSink, TaskAttributes, TaskManager,
    Timeout, TracingSink,
};

const MESSAGE: &[u8; 16] = b"hello from osa!\n";

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    info!("OSA demo starting...");
    let config = NetConfig::from_env();
    let sink: SharedSink = Arc::new(TracingSink);

    let queue = Arc::new(MessageQueue::create(8, MESSAGE.len())?);
    let server = Arc::new(Server::create(
        ComMode::Network,
        ComProtocol::TcpIp4,
        ServerAttributes::new(0, 0).with_address(std::net::Ipv4Addr::LOCALHOST),
        config.clone(),
        Some(Arc::clone(&sink)),
    )?);
    let port = server.local_addr()?.port();
    info!(port, "echo server bound");

    let manager = TaskManager::new();
    let echo = {
        let server = Arc::clone(&server);
        let queue = Arc::clone(&queue);
        manager.spawn(TaskAttributes::default().with_name("echo"), move |ctx| {
            let mut buf = [0u8; MESSAGE.len()];
            loop {
                ctx.checkpoint();
                let peer = match server.probe(Timeout::Millis(20)) {
                    Ok(Outcome::Ready(peer)) => peer,
                    Ok(Outcome::Pending) => continue,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        return 1;
                    }
                };
                if let Ok(Outcome::Ready(n)) = server.recv(peer, &mut buf, Timeout::Millis(500)) {
                    if let Err(e) = queue.send(&buf[..n], Timeout::NoWait, MessagePriority::Normal) {
                        warn!(error = %e, "queue send failed");
                    }
                    if let Err(e) = server.send(peer, &buf[..n], Timeout::Millis(500)) {
                        warn!(error = %e, "echo failed");
                    }
                }
                let _ = server.close_peer(peer);
            }
        })?
    };
    info!(task = %echo.id(), "echo task running");

    let mut client = Connection::create(
        ComMode::Network,
        ComProtocol::TcpIp4,
        config,
        Some(sink),
    )?;
    let mut endpoint = Endpoint::localhost(port);
    while client.do_work(&mut endpoint, Timeout::Millis(100))?.is_pending() {}
    info!(%endpoint, "client connected");

    if client.send(MESSAGE, Timeout::Millis(500))?.is_pending() {
        warn!("send did not complete");
    }
    let mut reply = [0u8; MESSAGE.len()];
    match client.recv(&mut reply, Timeout::Millis(1000))? {
        Outcome::Ready(n) => info!(bytes = n, echo = %String::from_utf8_lossy(&reply[..n]).trim_end(), "echo received"),
        Outcome::Pending => warn!("no echo within deadline"),
    }

    if let Outcome::Ready(message) = queue.receive_vec(Timeout::from(Duration::from_secs(1)))? {
        info!(bytes = message.len(), "server queued message");
    }
    info!(stats = %serde_json::to_string(&queue.stats())?, "queue stats");

    client.delete()?;
    manager.shutdown();
    info!("OSA demo finished");
    Ok(())
}
