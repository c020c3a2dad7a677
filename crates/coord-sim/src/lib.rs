//! Z-Stack Coordinator Simulation Library
//!
//! This crate simulates a TI Z-Stack coordinator speaking the ZNP serial
//! protocol, so coordinator probing can be tested without hardware. It
//! includes:
//!
//! - **VirtualCoordinator**: answers `SYS_PING` and `SYS_VERSION` requests,
//!   with optional line noise and corrupted checksums
//! - **run_virtual_coordinator_task**: drives a coordinator over any async stream
//!
//! # Example
//!
//! ```rust
//! use coord_sim::{VirtualCoordinator, VirtualCoordinatorConfig};
//! use znp_protocol::{EncodeCommand, ZnpFrame};
//!
//! let mut coordinator = VirtualCoordinator::from_config(VirtualCoordinatorConfig::default());
//! coordinator.process_bytes(&ZnpFrame::sys_ping().encode());
//!
//! while let Some(bytes) = coordinator.take_output() {
//!     println!("Coordinator output: {:02X?}", bytes);
//! }
//! ```

pub mod coordinator;
pub mod coordinator_task;

pub use coordinator::{VirtualCoordinator, VirtualCoordinatorConfig, ZSTACK_3X_VERSION};
pub use coordinator_task::{run_virtual_coordinator_task, VirtualCoordinatorCommand};
