//! Driver Station Protocol Core: a pluggable cadence loop, discovery pass,
//! and connection state machine for an operator-console/robot-controller
//! link, decoupled from any single wire format through the `Adapter` trait.
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use std::sync::Arc;
//! use dspc::core::ProtocolCore;
//! use dspc::proto::frc::FrcAdapter;
//! use dspc::input::GilrsAggregator;
//!
//! let adapter = Arc::new(FrcAdapter::new());
//! let input = Arc::new(GilrsAggregator::new()?);
//! let core = ProtocolCore::new(adapter, input, 3794).await?;
//! core.start();
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate tracing;

pub mod adapter;
pub mod clock;
pub mod core;
pub mod discovery;
pub mod error;
pub mod input;
pub mod prober;
pub mod proto;
pub mod socket_manager;
pub mod watchdog;

pub use adapter::{Adapter, ChangeEvent, ChangeKind};
pub use core::{Alliance, CommStatus, ControlMode, ProtocolCore};
pub use error::{ConfigError, InstallError};
