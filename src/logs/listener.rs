//! UDP log listener
//!
//! Receives forwarded log datagrams and pushes each parsed event through
//! the dispatcher, in arrival order, on a single task. Stopping works by
//! sending a zero-length poison datagram to the listening socket: the
//! blocking receive unblocks deterministically and the shutdown event
//! travels the same ordered path as real events.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::UdpSocket;

use super::parser::{parse_datagram, LogEvent};
use crate::dispatch::Dispatcher;

/// Largest datagram accepted in one receive
const READ_SIZE: usize = 1024;

/// Listener owning the UDP socket the game server forwards logs to
pub struct LogListener {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl LogListener {
    /// Bind the listening socket
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        tracing::info!("Listening for log datagrams on {}", local_addr);
        Ok(Self { socket, local_addr })
    }

    /// Actual bound address, useful when binding to port 0
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle for stopping the receive loop from another task
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            target: self.local_addr,
        }
    }

    /// Receive and dispatch datagrams until the poison datagram arrives
    ///
    /// Malformed datagrams are reported and dropped; a corrupt or foreign
    /// packet never takes the loop down. The shutdown event is delivered
    /// to every subscriber before this returns.
    pub async fn run(self, dispatcher: &mut Dispatcher) -> std::io::Result<()> {
        let mut buf = [0u8; READ_SIZE];
        loop {
            let (len, _) = self.socket.recv_from(&mut buf).await?;
            match parse_datagram(&buf[..len]) {
                Ok(LogEvent::Shutdown) => {
                    dispatcher.dispatch(&LogEvent::Shutdown).await;
                    return Ok(());
                }
                Ok(event) => dispatcher.dispatch(&event).await,
                Err(err) => {
                    tracing::warn!("Dropping malformed log datagram: {}", err);
                }
            }
        }
    }
}

/// Sends the poison datagram that unblocks the listener's receive loop
#[derive(Debug, Clone)]
pub struct StopHandle {
    target: SocketAddr,
}

impl StopHandle {
    /// Request shutdown. May be called from any task; the listener delivers
    /// the shutdown event and terminates once the datagram is received.
    pub async fn stop(&self) -> std::io::Result<()> {
        let mut target = self.target;
        if target.ip().is_unspecified() {
            target.set_ip(loopback_for(target.ip()));
        }

        let bind_addr = SocketAddr::new(loopback_for(target.ip()), 0);
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.send_to(&[], target).await?;
        Ok(())
    }
}

fn loopback_for(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Subscriber;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        events: Arc<Mutex<Vec<LogEvent>>>,
    }

    #[async_trait]
    impl Subscriber for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn on_event(&mut self, event: &LogEvent) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    async fn bound_listener() -> (LogListener, Arc<Mutex<Vec<LogEvent>>>, Dispatcher) {
        let listener = LogListener::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0))
            .await
            .unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Box::new(Recorder {
            events: Arc::clone(&events),
        }));
        (listener, events, dispatcher)
    }

    #[tokio::test]
    async fn dispatches_events_and_drops_malformed_datagrams() {
        let (listener, events, mut dispatcher) = bound_listener().await;
        let addr = listener.local_addr();

        // One sender socket keeps datagram ordering deterministic on
        // loopback; the poison comes through the same path here.
        let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        sender.send_to(b"no marker here", addr).await.unwrap();
        sender
            .send_to(b"\xff\xff\xff\xffR01/02/2020 - 03:04:05: hello world", addr)
            .await
            .unwrap();
        sender.send_to(b"", addr).await.unwrap();

        listener.run(&mut dispatcher).await.unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            LogEvent::Message { message, .. } if message == b"hello world"
        ));
        assert_eq!(events[1], LogEvent::Shutdown);
    }

    #[tokio::test]
    async fn stop_handle_terminates_the_loop_with_one_shutdown_event() {
        let (listener, events, mut dispatcher) = bound_listener().await;
        let stop = listener.stop_handle();

        stop.stop().await.unwrap();
        listener.run(&mut dispatcher).await.unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.as_slice(), &[LogEvent::Shutdown]);
    }

    #[tokio::test]
    async fn events_arrive_in_datagram_order() {
        let (listener, events, mut dispatcher) = bound_listener().await;
        let addr = listener.local_addr();

        let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        for n in 0..5u8 {
            let mut bytes = b"\xff\xff\xff\xffR01/02/2020 - 03:04:05: ".to_vec();
            bytes.extend_from_slice(format!("line {}", n).as_bytes());
            sender.send_to(&bytes, addr).await.unwrap();
        }
        sender.send_to(b"", addr).await.unwrap();

        listener.run(&mut dispatcher).await.unwrap();

        let events = events.lock().unwrap();
        let messages: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                LogEvent::Message { message, .. } => Some(message.clone()),
                LogEvent::Shutdown => None,
            })
            .collect();
        assert_eq!(
            messages,
            (0..5)
                .map(|n| format!("line {}", n).into_bytes())
                .collect::<Vec<_>>()
        );
    }
}
