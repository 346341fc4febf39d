//! Reachability Prober: lightweight, non-blocking TCP-connect liveness
//! checks for the radio (port 80) and the robot (protocol-defined port).
//! Two independent `Prober` instances exist — one per target — so sender
//! identity is a distinct handler function rather than a shared callback
//! keyed by object name.

use std::time::Duration;

use crossbeam_utils::atomic::AtomicCell;
use parking_lot::Mutex;
use tokio::net::TcpStream;

const CONNECT_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Disconnected,
    Connected,
}

/// Repeatedly attempts a TCP connect to `host:port`. Each `poll()` call
/// races a fresh connect attempt against a timeout via `futures_lite`'s
/// `race` — whichever resolves first wins, so a stalled prior attempt is
/// dropped (and its socket closed) the moment a newer `poll()` is issued,
/// satisfying "aborts any prior connection before issuing a new one".
pub struct Prober {
    target: Mutex<(String, u16)>,
    state: AtomicCell<ProbeState>,
}

impl Prober {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            target: Mutex::new((host.into(), port)),
            state: AtomicCell::new(ProbeState::Disconnected),
        }
    }

    pub fn retarget(&self, host: impl Into<String>, port: u16) {
        *self.target.lock() = (host.into(), port);
    }

    pub fn state(&self) -> ProbeState {
        self.state.load()
    }

    /// Forces the next `poll()` to be treated as a transition even if the
    /// underlying reachability hasn't changed — used when the core wants to
    /// force a fresh evaluation (e.g. after a watchdog-driven reset).
    pub fn reset(&self) {
        self.state.store(ProbeState::Disconnected);
    }

    /// Performs one probe attempt and returns `Some(new_state)` iff the
    /// state changed from the previous poll (a "transition"); returns `None`
    /// when the state is unchanged.
    pub async fn poll(&self) -> Option<ProbeState> {
        let (host, port) = self.target.lock().clone();

        let connect = async move {
            match TcpStream::connect((host.as_str(), port)).await {
                Ok(_stream) => ProbeState::Connected,
                Err(_) => ProbeState::Disconnected,
            }
        };
        let timeout = async {
            tokio::time::sleep(CONNECT_TIMEOUT).await;
            ProbeState::Disconnected
        };

        let observed = futures_lite::future::race(connect, timeout).await;
        let previous = self.state.swap(observed);
        if previous == observed {
            None
        } else {
            Some(observed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_target_stays_disconnected() {
        // Port 1 on loopback never accepts; this should time out cleanly
        // rather than hang.
        let prober = Prober::new("127.0.0.1", 1);
        let transition = prober.poll().await;
        assert!(transition.is_none() || transition == Some(ProbeState::Disconnected));
        assert_eq!(prober.state(), ProbeState::Disconnected);
    }

    #[tokio::test]
    async fn connecting_to_a_live_listener_reports_connected() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let prober = Prober::new(addr.ip().to_string(), addr.port());
        let transition = prober.poll().await;
        assert_eq!(transition, Some(ProbeState::Connected));
        assert_eq!(prober.state(), ProbeState::Connected);
    }
}
