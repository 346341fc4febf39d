//! Socket Manager: owns the four UDP endpoints (FMS-in, FMS-out, robot-in,
//! robot-out) and performs address sweeping for the robot output endpoint.
//!
//! The sockets themselves are plain fields — `tokio::net::UdpSocket`'s
//! `send_to`/`recv_from` take `&self`, so concurrent send/receive tasks
//! never contend on a lock. Only the sweep bookkeeping (cursor, pinned and
//! confirmed addresses) sits behind a `parking_lot::Mutex`, held only for
//! the duration of a synchronous cursor update, never across an `.await`.

use std::net::SocketAddr;
use parking_lot::Mutex;
use tokio::net::UdpSocket;

pub struct AdapterPorts {
    pub fms_input_port: u16,
    pub fms_output_port: u16,
    pub robot_input_port: u16,
    pub robot_output_port: u16,
}

struct SweepState {
    robot_ips: Vec<String>,
    cursor: usize,
    scanner_count: u32,
    pinned: Option<SocketAddr>,
    confirmed: Option<SocketAddr>,
}

pub struct SocketManager {
    robot_in: UdpSocket,
    fms_in: UdpSocket,
    robot_out: UdpSocket,
    fms_out: UdpSocket,
    robot_output_port: u16,
    #[allow(dead_code)]
    fms_output_port: u16,
    sweep: Mutex<SweepState>,
}

impl SocketManager {
    pub async fn bind(ports: AdapterPorts, scanner_count: u32) -> std::io::Result<Self> {
        let robot_in = UdpSocket::bind(("0.0.0.0", ports.robot_input_port)).await?;
        let fms_in = UdpSocket::bind(("0.0.0.0", ports.fms_input_port)).await?;
        let robot_out = UdpSocket::bind(("0.0.0.0", 0)).await?;
        let fms_out = UdpSocket::bind(("0.0.0.0", 0)).await?;

        Ok(Self {
            robot_in,
            fms_in,
            robot_out,
            fms_out,
            robot_output_port: ports.robot_output_port,
            fms_output_port: ports.fms_output_port,
            sweep: Mutex::new(SweepState {
                robot_ips: vec!["127.0.0.1".to_string()],
                cursor: 0,
                scanner_count: scanner_count.max(1),
                pinned: None,
                confirmed: None,
            }),
        })
    }

    /// Resets the sweep cursor and installs a new candidate list. Called
    /// whenever `ProtocolCore` regenerates `robot_ips`.
    pub fn refresh_ips(&self, robot_ips: Vec<String>) {
        let mut sweep = self.sweep.lock();
        sweep.robot_ips = if robot_ips.is_empty() {
            vec!["127.0.0.1".to_string()]
        } else {
            robot_ips
        };
        sweep.cursor = 0;
    }

    /// Pins the robot endpoint, bypassing the sweep entirely.
    pub fn pin_address(&self, addr: SocketAddr) {
        self.sweep.lock().pinned = Some(addr);
    }

    pub fn unpin(&self) {
        self.sweep.lock().pinned = None;
    }

    pub fn is_pinned(&self) -> bool {
        self.sweep.lock().pinned.is_some()
    }

    /// Records that a decodable datagram was received from `addr`: a
    /// confirmed reception. `robot_address()` only reports a non-empty
    /// string after this has happened at least once (or after a pin).
    pub fn confirm(&self, addr: SocketAddr) {
        self.sweep.lock().confirmed = Some(addr);
    }

    pub fn clear_confirmation(&self) {
        self.sweep.lock().confirmed = None;
    }

    /// The confirmed (or pinned) robot address, or the empty string before
    /// any confirmed reception.
    pub fn robot_address(&self) -> String {
        let sweep = self.sweep.lock();
        sweep
            .pinned
            .or(sweep.confirmed)
            .map(|a| a.ip().to_string())
            .unwrap_or_default()
    }

    /// Candidate targets for the current tick: the pinned address alone if
    /// pinned, the confirmed address alone once one has been received (the
    /// sweep is only active while failing/partial — a confirmed address
    /// means the link is up and must stop rotating away from it), otherwise
    /// up to `scanner_count` sweep candidates starting at the cursor.
    /// Advances the cursor by the number of candidates returned so each
    /// candidate gets one output period of dwell before the sweep moves
    /// past it.
    pub fn targets_for_tick(&self) -> Vec<SocketAddr> {
        let mut sweep = self.sweep.lock();
        if let Some(pinned) = sweep.pinned {
            return vec![pinned];
        }
        if let Some(confirmed) = sweep.confirmed {
            // `confirmed` records the source address of the last decoded
            // datagram (an arbitrary ephemeral source port); outbound
            // control traffic always targets the adapter's configured
            // robot output port, not that source port.
            return vec![SocketAddr::new(confirmed.ip(), self.robot_output_port)];
        }
        if sweep.robot_ips.is_empty() {
            return Vec::new();
        }

        let count = (sweep.scanner_count as usize).min(sweep.robot_ips.len());
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let idx = (sweep.cursor + i) % sweep.robot_ips.len();
            if let Ok(ip) = sweep.robot_ips[idx].parse() {
                out.push(SocketAddr::new(ip, self.robot_output_port));
            }
        }
        sweep.cursor = (sweep.cursor + count) % sweep.robot_ips.len();
        out
    }

    /// Restarts the sweep from the first candidate; called on every
    /// watchdog-driven reset.
    pub fn restart_sweep(&self) {
        self.sweep.lock().cursor = 0;
    }

    /// Locally bound address of the robot-in socket, for callers (tests,
    /// primarily) that need to address a datagram at a core bound to
    /// ephemeral ports.
    pub fn robot_in_local_addr(&self) -> std::io::Result<SocketAddr> {
        self.robot_in.local_addr()
    }

    pub fn fms_in_local_addr(&self) -> std::io::Result<SocketAddr> {
        self.fms_in.local_addr()
    }

    pub async fn send_robot(&self, bytes: &[u8], targets: &[SocketAddr]) {
        for target in targets {
            if let Err(err) = self.robot_out.send_to(bytes, target).await {
                tracing::debug!(%err, %target, "robot datagram send failed");
            }
        }
    }

    pub async fn send_fms(&self, bytes: &[u8], fms_addr: SocketAddr) {
        if let Err(err) = self.fms_out.send_to(bytes, fms_addr).await {
            tracing::debug!(%err, "fms datagram send failed");
        }
    }

    /// Awaits the next datagram on the robot-in port, returning its payload
    /// and source address (used to `confirm()` a sweep candidate).
    pub async fn recv_robot(&self) -> std::io::Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; 4096];
        let (len, addr) = self.robot_in.recv_from(&mut buf).await?;
        buf.truncate(len);
        Ok((buf, addr))
    }

    pub async fn recv_fms(&self) -> std::io::Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; 4096];
        let (len, addr) = self.fms_in.recv_from(&mut buf).await?;
        buf.truncate(len);
        Ok((buf, addr))
    }
}
