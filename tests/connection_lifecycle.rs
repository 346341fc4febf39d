//! End-to-end connection lifecycle scenarios, driven against `proto::sim`
//! over real loopback sockets.

use std::sync::Arc;
use std::time::Duration;

use dspc::core::{Alliance, CommStatus, ControlMode};
use dspc::discovery::{InterfaceSource, Ipv4Interface};
use dspc::input::FixedAggregator;
use dspc::proto::sim::{simulate_robot_reply, SimAdapter};
use dspc::socket_manager::AdapterPorts;
use dspc::{Adapter, ProtocolCore};

/// No local interfaces at all, so discovery only ever sees adapter extras
/// plus the two mandatory entries — deterministic regardless of the host
/// running the test.
struct NoInterfaces;
impl InterfaceSource for NoInterfaces {
    fn enumerate(&self) -> Vec<Ipv4Interface> {
        Vec::new()
    }
}

async fn sim_core(team: u32, ports: AdapterPorts) -> Arc<ProtocolCore> {
    let adapter = Arc::new(SimAdapter::new(ports));
    let input = Arc::new(FixedAggregator(vec![]));
    ProtocolCore::with_interfaces(adapter, input, team, Arc::new(NoInterfaces))
        .await
        .expect("binding ephemeral ports should never fail")
}

/// Scenario 1: team change regenerates the radio address (P1).
#[tokio::test]
async fn team_change_regenerates_radio() {
    let core = sim_core(0, SimAdapter::ephemeral().ports()).await;

    core.set_team(3794).await;
    assert!(core.radio_ips().contains(&"10.37.94.1".to_string()));

    core.set_team(118).await;
    assert!(core.radio_ips().contains(&"10.1.18.1".to_string()));
}

/// P2: `robot_ips` always contains the loopback address, regardless of team.
#[tokio::test]
async fn robot_ips_always_contains_loopback() {
    let core = sim_core(340, SimAdapter::ephemeral().ports()).await;
    assert!(core.robot_ips().contains(&"127.0.0.1".to_string()));
    core.set_team(9999).await;
    assert!(core.robot_ips().contains(&"127.0.0.1".to_string()));
}

/// Scenario 3: e-stop auto-clears 500ms after being set, and a control-mode
/// change attempted while e-stopped is silently rejected.
#[tokio::test]
async fn emergency_stop_auto_clears_and_blocks_mode_changes() {
    let core = sim_core(118, SimAdapter::ephemeral().ports()).await;

    core.set_emergency_stop(true);
    assert!(core.emergency_stop());

    core.set_control_mode(ControlMode::Autonomous);
    assert_eq!(core.control_mode(), ControlMode::Invalid);

    tokio::time::sleep(Duration::from_millis(650)).await;
    assert!(!core.emergency_stop());

    // Now that e-stop has cleared, the same mode change is accepted.
    core.set_control_mode(ControlMode::Autonomous);
    assert_eq!(core.control_mode(), ControlMode::Autonomous);
}

/// Re-setting e-stop before the auto-clear fires re-arms a fresh timer
/// rather than letting the earlier one fire early.
#[tokio::test]
async fn re_setting_emergency_stop_re_arms_the_clear_timer() {
    let core = sim_core(118, SimAdapter::ephemeral().ports()).await;

    core.set_emergency_stop(true);
    tokio::time::sleep(Duration::from_millis(350)).await;
    core.set_emergency_stop(true); // re-arm with 350ms already elapsed
    tokio::time::sleep(Duration::from_millis(300)).await;
    // Only 300ms since the second call; the first call's clear must not
    // have fired and cleared it early.
    assert!(core.emergency_stop());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!core.emergency_stop());
}

/// Scenario 4: the full connection lifecycle, Failing -> Partial -> Full ->
/// Failing, driven over real loopback TCP/UDP sockets.
#[tokio::test(flavor = "multi_thread")]
async fn full_connection_lifecycle() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind probe listener");
    let probe_port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while listener.accept().await.is_ok() {}
    });

    let core = sim_core(
        118,
        AdapterPorts {
            fms_input_port: 0,
            fms_output_port: 0,
            robot_input_port: 0,
            robot_output_port: probe_port,
        },
    )
    .await;
    core.start();

    assert_eq!(core.comm_status(), CommStatus::Failing);

    // Init ceremony (200ms reset, 800ms initialize -> spawns the event
    // loop) plus at least one 100ms prober tick.
    tokio::time::sleep(Duration::from_millis(1400)).await;
    assert_eq!(core.comm_status(), CommStatus::Partial);

    let robot_in_addr = core
        .robot_in_local_addr()
        .expect("robot-in socket should be bound");
    let sender = tokio::net::UdpSocket::bind("127.0.0.1:0")
        .await
        .expect("bind test sender socket");
    let reply = simulate_robot_reply(&[0, 0, 1, 0], 12, 34);
    sender
        .send_to(&reply, robot_in_addr)
        .await
        .expect("send decodable robot datagram");

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(core.comm_status(), CommStatus::Full);
    assert_eq!(core.control_mode(), ControlMode::Teleop);
    assert_eq!(core.battery_voltage().0, "12.34");
    assert!(core.robot_code());

    // No further datagrams arrive; the watchdog (armed to 1000ms on
    // Partial->Full) must expire and regress the state machine.
    tokio::time::sleep(Duration::from_millis(1250)).await;
    assert_eq!(core.comm_status(), CommStatus::Failing);
    assert!(!core.robot_code());
    assert_eq!(core.battery_voltage().0, "00.00");
}

/// Scenario 5: cadence independence — fms_hz and robot_hz advance their own
/// counters at their own rates, not coupled to each other.
#[tokio::test(flavor = "multi_thread")]
async fn cadence_independence() {
    let core = sim_core(118, SimAdapter::ephemeral().ports()).await;
    core.start();

    // Let the init ceremony finish and the event loop spin up.
    tokio::time::sleep(Duration::from_millis(900)).await;
    let fms_before = core.sent_fms_packets();
    let robot_before = core.sent_robot_packets();

    tokio::time::sleep(Duration::from_millis(1000)).await;
    let fms_count = core.sent_fms_packets() - fms_before;
    let robot_count = core.sent_robot_packets() - robot_before;

    // SimAdapter: fms_hz=2, robot_hz=20. Allow generous scheduling jitter.
    assert!((1..=4).contains(&fms_count), "fms_count={fms_count}");
    assert!((15..=25).contains(&robot_count), "robot_count={robot_count}");
}

/// Alliance station is observable independent of the connection lifecycle.
#[tokio::test]
async fn alliance_defaults_to_red1() {
    let core = sim_core(118, SimAdapter::ephemeral().ports()).await;
    assert_eq!(core.alliance(), Alliance::Red1);
}
