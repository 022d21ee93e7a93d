#![warn(missing_docs)]

//! Print control for a DLP resin printer.
//!
//! This crate provides:
//! - The [`PrintController`] state machine that slices, displays and moves
//!   the stage one layer at a time
//! - [`FrameStore`], the display sink shared with the projector's web page
//! - Stepper actuators: [`LineStepper`] for the serial board and
//!   [`SimulatedActuator`] for dry runs
//! - [`PrintConfig`], loadable from TOML
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use dlprint_control::{AckMode, FrameStore, PrintConfig, PrintController, SimulatedActuator, StopHandle};
//! use dlprint_slicer::Octahedron;
//!
//! let config = PrintConfig { layer_step: 1.0, ..Default::default() };
//! let display = Arc::new(FrameStore::new(AckMode::Timer));
//! let stop = StopHandle::new();
//! let controller = PrintController::new(
//!     config,
//!     Arc::new(Octahedron),
//!     display,
//!     Arc::new(SimulatedActuator::new()),
//!     &stop,
//! )?;
//! let report = controller.run().await;
//! println!("{:?} after {} layers", report.outcome, report.layers);
//! ```

pub mod actuator;
pub mod config;
pub mod controller;
pub mod display;
pub mod error;
pub mod status;
pub mod stop;

pub use actuator::{Actuator, LineStepper, SimulatedActuator};
pub use config::{PrintConfig, STEPS_PER_HUNDREDTH_INCH};
pub use controller::PrintController;
pub use display::{AckMode, DisplaySink, DisplayStatus, FrameStore};
pub use error::{ActuatorError, ControlError, DisplayError, Result};
pub use status::{AbortReason, Completion, JobReport, PrintJob, PrintState};
pub use stop::StopHandle;
