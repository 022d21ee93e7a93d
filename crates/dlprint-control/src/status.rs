//! Controller states and job results.

use std::time::Duration;

use dlprint_slicer::LayerColor;
use serde::Serialize;
use thiserror::Error;

use crate::config::PrintConfig;

/// How a job that reached `Done` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// Ran past the end height or the top of the model.
    Finished,
    /// The operator asked to stop.
    Stopped,
}

/// Why a job was aborted.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// No acknowledgment for the displayed frame in time.
    #[error("hardware did not acknowledge: display never confirmed the frame")]
    DisplayTimeout,
    /// The stage move did not finish in time.
    #[error("hardware did not acknowledge: actuator move timed out")]
    ActuatorTimeout,
    /// The actuator reported an error.
    #[error("actuator fault: {0}")]
    ActuatorFault(String),
    /// The display refused the frame.
    #[error("display fault: {0}")]
    DisplayFault(String),
    /// The model failed to render a layer.
    #[error("model error: {0}")]
    Model(String),
}

/// Controller state, published on every transition.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintState {
    /// Not started.
    #[default]
    Idle,
    /// Rendering a layer.
    Slicing {
        /// Layer index.
        layer: u64,
        /// Layer height.
        z: f64,
    },
    /// Handing a frame to the display.
    Displaying {
        /// Layer index.
        layer: u64,
        /// Frame being shown.
        sequence_id: u64,
    },
    /// Waiting for the display to confirm the exposure.
    AwaitingAcknowledgment {
        /// Layer index.
        layer: u64,
        /// Frame awaiting acknowledgment.
        sequence_id: u64,
    },
    /// Moving the stage.
    Actuating {
        /// Layer index.
        layer: u64,
        /// Steps commanded.
        steps: i64,
    },
    /// Ended normally.
    Done(Completion),
    /// Ended on a fault.
    Aborted(AbortReason),
}

impl PrintState {
    /// Whether no further transitions will happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PrintState::Done(_) | PrintState::Aborted(_))
    }
}

/// Mutable state of a running job.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintJob {
    /// Index of the current layer.
    pub layer: u64,
    /// Height of the current layer.
    pub z: f64,
    /// Id of the last published frame.
    pub sequence_id: u64,
    /// Color of lit pixels.
    pub color: LayerColor,
    /// Exposure per layer.
    pub exposure: Duration,
    /// Cleared once a terminal state is reached; the controller loops on it.
    pub running: bool,
    /// Non-manifold scanlines seen so far.
    pub truncated_scanlines: u64,
}

impl PrintJob {
    /// Fresh job at the start height; frame ids continue after `last_sequence_id`.
    pub fn new(config: &PrintConfig, last_sequence_id: u64) -> Self {
        Self {
            layer: 0,
            z: config.height_of(0),
            sequence_id: last_sequence_id,
            color: config.color,
            exposure: config.exposure(),
            running: true,
            truncated_scanlines: 0,
        }
    }

    /// Allocate the id for the next frame.
    pub fn next_sequence_id(&mut self) -> u64 {
        self.sequence_id += 1;
        self.sequence_id
    }

    /// Mark the job as ended; the controller stops after the current layer.
    pub fn finish(&mut self) {
        self.running = false;
    }

    /// Move on to the next layer.
    pub fn advance(&mut self, config: &PrintConfig) {
        self.layer += 1;
        self.z = config.height_of(self.layer);
    }
}

/// Summary returned when a job ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    /// Terminal state.
    pub outcome: PrintState,
    /// Layers fully exposed and moved past.
    pub layers: u64,
    /// Non-manifold scanlines across all layers.
    pub truncated_scanlines: u64,
}

impl JobReport {
    /// Process exit code: 0 for `Done`, 1 for `Aborted`.
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            PrintState::Done(_) => 0,
            _ => 1,
        }
    }
}
