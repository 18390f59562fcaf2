//! Peer hang-up detection for event streams
//!
//! actix-web notices a closed client only when a write to it fails, and the
//! first write after a close usually still succeeds. An idle SSE response can
//! therefore outlive its client until two more frames have been written.
//!
//! [`watch_peer`] is installed with `HttpServer::on_connect`. It keeps a
//! duplicate of each accepted socket and peeks at it until the peer sends
//! FIN or resets, then flips the [`PeerHangup`] stored in the connection
//! data. The events handler ends the response stream on that signal, and the
//! dropped subscription leaves the broadcaster without waiting for a write.
//!
//! Where the socket cannot be duplicated (non-unix targets, fd exhaustion)
//! no signal is installed and disconnects fall back to write failures, which
//! the heartbeat bounds to two heartbeat periods.

use actix_web::dev::Extensions;
use futures::future::{self, BoxFuture, FutureExt};
use std::any::Any;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Pause before peeking again while the server has unread request bytes
const UNREAD_INPUT_BACKOFF: Duration = Duration::from_millis(250);

/// Connection data that resolves once the peer has gone away
#[derive(Debug, Clone)]
pub struct PeerHangup {
    closed: watch::Receiver<bool>,
}

impl PeerHangup {
    /// Future that completes when the peer hangs up.
    ///
    /// Never completes for a request without a watched connection.
    pub fn for_connection(hangup: Option<&PeerHangup>) -> BoxFuture<'static, ()> {
        match hangup {
            Some(hangup) => hangup.closed(),
            None => future::pending().boxed(),
        }
    }

    pub fn closed(&self) -> BoxFuture<'static, ()> {
        let mut closed = self.closed.clone();
        async move {
            // An error means the watcher is gone, which only happens after
            // it reported the hang-up or the connection was torn down
            let _ = closed.wait_for(|closed| *closed).await;
        }
        .boxed()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

/// `HttpServer::on_connect` hook that watches TCP connections for hang-ups.
#[cfg(unix)]
pub fn watch_peer(connection: &dyn Any, data: &mut Extensions) {
    let Some(stream) = connection.downcast_ref::<tokio::net::TcpStream>() else {
        return;
    };

    match duplicate(stream) {
        Ok(peer) => {
            data.insert(spawn_watch(peer));
        }
        Err(e) => {
            debug!(error = %e, "Connection not watched for hang-up");
        }
    }
}

#[cfg(not(unix))]
pub fn watch_peer(_connection: &dyn Any, _data: &mut Extensions) {}

#[cfg(unix)]
fn duplicate(stream: &tokio::net::TcpStream) -> std::io::Result<tokio::net::TcpStream> {
    use std::os::fd::AsFd;

    let fd = stream.as_fd().try_clone_to_owned()?;
    let peer = std::net::TcpStream::from(fd);
    peer.set_nonblocking(true)?;
    tokio::net::TcpStream::from_std(peer)
}

/// Peek at the duplicate until it reports end of stream.
///
/// The task exits early once every `PeerHangup` for the connection is
/// dropped, so the duplicate never keeps a finished connection open.
/// Unread input hides a FIN behind it, so a peer that sends bytes the server
/// never reads is only reported once it resets.
#[cfg(unix)]
fn spawn_watch(peer: tokio::net::TcpStream) -> PeerHangup {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        let mut buf = [0u8; 1];
        loop {
            tokio::select! {
                _ = tx.closed() => return,
                peeked = peer.peek(&mut buf) => match peeked {
                    Ok(0) => break,
                    // Bytes the server has not read yet; they are not ours to consume
                    Ok(_) => {}
                    Err(e) => {
                        debug!(error = %e, "Connection reset");
                        break;
                    }
                },
            }
            tokio::time::sleep(UNREAD_INPUT_BACKOFF).await;
        }

        debug!("Peer hung up");
        let _ = tx.send(true);
    });

    PeerHangup { closed: rx }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;

    async fn watched_pair() -> (TcpStream, TcpStream, PeerHangup) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let (server, _) = listener.accept().await.unwrap();

        let mut data = Extensions::new();
        watch_peer(&server, &mut data);
        let hangup = data.get::<PeerHangup>().cloned().expect("hang-up watch installed");

        (client, server, hangup)
    }

    #[tokio::test]
    async fn test_client_close_is_reported() {
        let (client, _server, hangup) = watched_pair().await;
        assert!(!hangup.is_closed());

        drop(client);
        timeout(Duration::from_secs(2), hangup.closed())
            .await
            .expect("hang-up not reported");
        assert!(hangup.is_closed());
    }

    #[tokio::test]
    async fn test_unread_input_is_not_a_hangup() {
        let (mut client, mut server, hangup) = watched_pair().await;

        client.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();
        assert!(timeout(Duration::from_millis(400), hangup.closed())
            .await
            .is_err());

        // The server consumes the request, as the HTTP dispatcher would
        let mut buf = [0u8; 64];
        let read = server.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..read], b"GET / HTTP/1.1\r\n");

        drop(client);
        timeout(Duration::from_secs(2), hangup.closed())
            .await
            .expect("hang-up not reported");
    }

    #[test]
    fn test_other_connections_are_not_watched() {
        let mut data = Extensions::new();
        watch_peer(&"not a socket", &mut data);
        assert!(data.get::<PeerHangup>().is_none());
    }

    #[tokio::test]
    async fn test_unwatched_request_never_resolves() {
        let pending = PeerHangup::for_connection(None);
        assert!(timeout(Duration::from_millis(50), pending).await.is_err());
    }
}
