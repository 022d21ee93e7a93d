//! The print control loop.
//!
//! ```text
//! Idle → Slicing → Displaying → AwaitingAcknowledgment → Actuating ─┐
//!          ▲                                                        │
//!          └────────────────────────────────────────────────────────┘
//! ```
//!
//! Every waiting step is bounded and also races the stop signal. Anything
//! other than a normal finish halts the actuator exactly once before the
//! terminal state is published.

use std::future::Future;
use std::sync::Arc;

use dlprint_slicer::{Frame, LayerRaster, Model};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::actuator::Actuator;
use crate::config::PrintConfig;
use crate::display::DisplaySink;
use crate::error::Result;
use crate::status::{AbortReason, Completion, JobReport, PrintJob, PrintState};
use crate::stop::{stop_requested, StopHandle};

/// Slack on the end-height comparison so `start + n·step` lands on `end`.
const HEIGHT_EPSILON: f64 = 1.0e-9;

/// Drives one print job from the first layer to a terminal state.
pub struct PrintController {
    config: PrintConfig,
    model: Arc<dyn Model>,
    display: Arc<dyn DisplaySink>,
    actuator: Arc<dyn Actuator>,
    stop: watch::Receiver<bool>,
    state: watch::Sender<PrintState>,
}

/// Outcome of one bounded wait.
enum Step<T> {
    Ready(T),
    End(PrintState),
}

impl PrintController {
    /// Validate `config` and wire up the collaborators.
    pub fn new(
        config: PrintConfig,
        model: Arc<dyn Model>,
        display: Arc<dyn DisplaySink>,
        actuator: Arc<dyn Actuator>,
        stop: &StopHandle,
    ) -> Result<Self> {
        config.validate()?;
        let (state, _) = watch::channel(PrintState::Idle);
        Ok(Self {
            config,
            model,
            display,
            actuator,
            stop: stop.subscribe(),
            state,
        })
    }

    /// Follow state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<PrintState> {
        self.state.subscribe()
    }

    /// The job configuration.
    pub fn config(&self) -> &PrintConfig {
        &self.config
    }

    /// Run the job to completion.
    pub async fn run(mut self) -> JobReport {
        let mut acks = self.display.subscribe_acknowledgments();
        let last_ack = *acks.borrow_and_update();
        let mut job = PrintJob::new(&self.config, last_ack);
        info!(
            model = self.model.name(),
            start = self.config.start_height,
            end = ?self.config.end_height,
            step = self.config.layer_step,
            exposure_ms = self.config.exposure_ms,
            "print job started"
        );

        let mut outcome = PrintState::Done(Completion::Finished);
        while job.running {
            if let Some(end) = self.print_layer(&mut job, &mut acks).await {
                outcome = end;
                job.finish();
            }
        }

        self.conclude(outcome, &job).await
    }

    /// Expose one layer and move past it. Returns the terminal state if the
    /// job ends here.
    async fn print_layer(
        &mut self,
        job: &mut PrintJob,
        acks: &mut watch::Receiver<u64>,
    ) -> Option<PrintState> {
        if let Some(end) = self.config.end_height {
            if job.z > end + HEIGHT_EPSILON {
                return Some(PrintState::Done(Completion::Finished));
            }
        }

        self.transition(PrintState::Slicing {
            layer: job.layer,
            z: job.z,
        });
        let raster = match self.render(job).await {
            Step::Ready(raster) => raster,
            Step::End(state) => return Some(state),
        };
        job.truncated_scanlines += raster.truncated_scanlines as u64;

        let sequence_id = job.next_sequence_id();
        let frame = Arc::new(Frame::new(sequence_id, job.exposure, job.z, raster.canvas));
        self.transition(PrintState::Displaying {
            layer: job.layer,
            sequence_id,
        });
        if let Err(e) = self.display.publish(frame) {
            return Some(PrintState::Aborted(AbortReason::DisplayFault(e.to_string())));
        }

        self.transition(PrintState::AwaitingAcknowledgment {
            layer: job.layer,
            sequence_id,
        });
        if let Step::End(state) = self.await_acknowledgment(acks, sequence_id).await {
            return Some(state);
        }

        let steps = self.config.steps_per_layer;
        self.transition(PrintState::Actuating {
            layer: job.layer,
            steps,
        });
        if let Step::End(state) = self.actuate(steps).await {
            return Some(state);
        }

        job.advance(&self.config);
        None
    }

    async fn render(&mut self, job: &PrintJob) -> Step<LayerRaster> {
        let model = Arc::clone(&self.model);
        let (z, width, height, color) = (job.z, self.config.width, self.config.height, job.color);
        let task = tokio::task::spawn_blocking(move || model.render_layer(z, width, height, color));

        match self.race_stop(task).await {
            Step::Ready(Ok(Ok(Some(raster)))) => Step::Ready(raster),
            Step::Ready(Ok(Ok(None))) => {
                debug!(z, "model has no layer here");
                Step::End(PrintState::Done(Completion::Finished))
            }
            Step::Ready(Ok(Err(e))) => Step::End(PrintState::Aborted(AbortReason::Model(e.to_string()))),
            Step::Ready(Err(e)) => Step::End(PrintState::Aborted(AbortReason::Model(e.to_string()))),
            Step::End(state) => Step::End(state),
        }
    }

    async fn await_acknowledgment(
        &mut self,
        acks: &mut watch::Receiver<u64>,
        sequence_id: u64,
    ) -> Step<()> {
        let deadline = self.config.acknowledgment_deadline();
        let wait = tokio::time::timeout(deadline, async {
            acks.wait_for(|&acked| acked >= sequence_id).await.map(|_| ())
        });

        match self.race_stop(wait).await {
            Step::Ready(Ok(Ok(()))) => {
                debug!(sequence_id, "frame acknowledged");
                Step::Ready(())
            }
            Step::Ready(Ok(Err(_))) => Step::End(PrintState::Aborted(AbortReason::DisplayFault(
                "acknowledgment channel closed".into(),
            ))),
            Step::Ready(Err(_)) => {
                warn!(sequence_id, timeout_ms = deadline.as_millis() as u64, "display did not acknowledge");
                Step::End(PrintState::Aborted(AbortReason::DisplayTimeout))
            }
            Step::End(state) => Step::End(state),
        }
    }

    async fn actuate(&mut self, steps: i64) -> Step<()> {
        let actuator = Arc::clone(&self.actuator);
        let timeout = self.config.actuator_timeout();
        let task = tokio::time::timeout(
            timeout,
            tokio::task::spawn_blocking(move || actuator.move_steps(steps)),
        );

        match self.race_stop(task).await {
            Step::Ready(Ok(Ok(Ok(())))) => Step::Ready(()),
            Step::Ready(Ok(Ok(Err(e)))) => {
                Step::End(PrintState::Aborted(AbortReason::ActuatorFault(e.to_string())))
            }
            Step::Ready(Ok(Err(e))) => {
                Step::End(PrintState::Aborted(AbortReason::ActuatorFault(e.to_string())))
            }
            Step::Ready(Err(_)) => {
                warn!(steps, timeout_ms = timeout.as_millis() as u64, "actuator did not acknowledge");
                Step::End(PrintState::Aborted(AbortReason::ActuatorTimeout))
            }
            Step::End(state) => Step::End(state),
        }
    }

    /// Await `fut` unless a stop request comes first.
    async fn race_stop<F: Future>(&mut self, fut: F) -> Step<F::Output> {
        tokio::select! {
            biased;
            _ = stop_requested(&mut self.stop) => Step::End(PrintState::Done(Completion::Stopped)),
            out = fut => Step::Ready(out),
        }
    }

    async fn conclude(&self, outcome: PrintState, job: &PrintJob) -> JobReport {
        if outcome != PrintState::Done(Completion::Finished) {
            self.halt().await;
        }

        match &outcome {
            PrintState::Aborted(reason) => error!(layer = job.layer, z = job.z, %reason, "print aborted"),
            _ => info!(layer = job.layer, z = job.z, outcome = ?outcome, "print ended"),
        }
        if job.truncated_scanlines > 0 {
            warn!(
                truncated_scanlines = job.truncated_scanlines,
                "mesh is not watertight; some scanlines were cut short"
            );
        }

        self.transition(outcome.clone());
        JobReport {
            outcome,
            layers: job.layer,
            truncated_scanlines: job.truncated_scanlines,
        }
    }

    async fn halt(&self) {
        let actuator = Arc::clone(&self.actuator);
        let timeout = self.config.actuator_timeout();
        let halted = tokio::time::timeout(
            timeout,
            tokio::task::spawn_blocking(move || actuator.halt()),
        )
        .await;
        match halted {
            Ok(Ok(Ok(()))) => debug!("actuator halted"),
            Ok(Ok(Err(e))) => error!(error = %e, "actuator halt failed"),
            Ok(Err(e)) => error!(error = %e, "actuator halt task failed"),
            Err(_) => error!(timeout_ms = timeout.as_millis() as u64, "actuator halt timed out"),
        }
    }

    fn transition(&self, state: PrintState) {
        debug!(?state, "state transition");
        self.state.send_replace(state);
    }
}

impl std::fmt::Debug for PrintController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrintController")
            .field("model", &self.model.name())
            .field("config", &self.config)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Condvar, Mutex};
    use std::time::{Duration, Instant};

    use dlprint_kernel_math::{BoundingBox, Vector};
    use dlprint_slicer::{Canvas, LayerColor, SlicerError};

    use crate::actuator::SimulatedActuator;
    use crate::display::{AckMode, FrameStore};
    use crate::error::ActuatorError;

    /// Flat model with `layers` unit-height layers.
    struct Slab {
        layers: u64,
        fail_at: Option<u64>,
    }

    impl Model for Slab {
        fn name(&self) -> &str {
            "slab"
        }

        fn bounds(&self) -> BoundingBox {
            BoundingBox::from_points(&[Vector::zero(), Vector::new(1.0, 1.0, self.layers as f64)])
        }

        fn render_layer(
            &self,
            z: f64,
            width: usize,
            height: usize,
            color: LayerColor,
        ) -> dlprint_slicer::Result<Option<LayerRaster>> {
            if self.fail_at == Some(z as u64) {
                return Err(SlicerError::EmptyMesh);
            }
            if z >= self.layers as f64 {
                return Ok(None);
            }
            let mut canvas = Canvas::new(width, height);
            canvas.set_pixel(0, 0, color.rgb());
            Ok(Some(LayerRaster {
                canvas,
                truncated_scanlines: 1,
            }))
        }
    }

    /// Actuator whose moves never finish until halted.
    #[derive(Default)]
    struct StuckActuator {
        halted: Mutex<bool>,
        wake: Condvar,
        moves: AtomicUsize,
        halts: AtomicUsize,
    }

    impl Actuator for StuckActuator {
        fn move_steps(&self, _steps: i64) -> std::result::Result<(), ActuatorError> {
            self.moves.fetch_add(1, Ordering::SeqCst);
            let mut halted = self.halted.lock().unwrap();
            while !*halted {
                halted = self.wake.wait(halted).unwrap();
            }
            Err(ActuatorError::Halted)
        }

        fn halt(&self) -> std::result::Result<(), ActuatorError> {
            self.halts.fetch_add(1, Ordering::SeqCst);
            *self.halted.lock().unwrap() = true;
            self.wake.notify_all();
            Ok(())
        }
    }

    /// Counts halts around a simulated stage.
    #[derive(Default)]
    struct CountingActuator {
        inner: SimulatedActuator,
        halts: AtomicUsize,
    }

    impl Actuator for CountingActuator {
        fn move_steps(&self, steps: i64) -> std::result::Result<(), ActuatorError> {
            self.inner.move_steps(steps)
        }

        fn halt(&self) -> std::result::Result<(), ActuatorError> {
            self.halts.fetch_add(1, Ordering::SeqCst);
            self.inner.halt()
        }
    }

    fn config() -> PrintConfig {
        PrintConfig {
            layer_step: 1.0,
            exposure_ms: 5,
            width: 4,
            height: 3,
            display_timeout_ms: 500,
            actuator_timeout_ms: 500,
            ..Default::default()
        }
    }

    fn slab(layers: u64) -> Arc<dyn Model> {
        Arc::new(Slab {
            layers,
            fail_at: None,
        })
    }

    async fn run_bounded(controller: PrintController) -> JobReport {
        tokio::time::timeout(Duration::from_secs(5), controller.run())
            .await
            .expect("job did not terminate")
    }

    #[tokio::test]
    async fn test_runs_until_model_ends() {
        let actuator = Arc::new(CountingActuator::default());
        let display = Arc::new(FrameStore::new(AckMode::Timer));
        let controller = PrintController::new(
            config(),
            slab(3),
            display.clone(),
            actuator.clone(),
            &StopHandle::new(),
        )
        .unwrap();

        let report = run_bounded(controller).await;
        assert_eq!(report.outcome, PrintState::Done(Completion::Finished));
        assert_eq!(report.layers, 3);
        assert_eq!(report.truncated_scanlines, 3);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(actuator.inner.moves(), 3);
        assert_eq!(actuator.inner.position(), 3 * 720);
        assert_eq!(actuator.halts.load(Ordering::SeqCst), 0);
        assert_eq!(display.current().unwrap().sequence_id(), 3);
    }

    #[tokio::test]
    async fn test_end_height_is_inclusive() {
        let actuator = Arc::new(CountingActuator::default());
        let config = PrintConfig {
            start_height: 0.0,
            end_height: Some(2.0),
            ..config()
        };
        let controller = PrintController::new(
            config,
            slab(10),
            Arc::new(FrameStore::new(AckMode::Timer)),
            actuator.clone(),
            &StopHandle::new(),
        )
        .unwrap();

        let report = run_bounded(controller).await;
        assert_eq!(report.outcome, PrintState::Done(Completion::Finished));
        assert_eq!(report.layers, 3);
        assert_eq!(actuator.inner.moves(), 3);
    }

    #[tokio::test]
    async fn test_stuck_actuator_aborts_with_one_move_and_one_halt() {
        let actuator = Arc::new(StuckActuator::default());
        let config = PrintConfig {
            actuator_timeout_ms: 50,
            ..config()
        };
        let controller = PrintController::new(
            config,
            slab(5),
            Arc::new(FrameStore::new(AckMode::Timer)),
            actuator.clone(),
            &StopHandle::new(),
        )
        .unwrap();

        let start = Instant::now();
        let report = run_bounded(controller).await;
        assert_eq!(report.outcome, PrintState::Aborted(AbortReason::ActuatorTimeout));
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.layers, 0);
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(actuator.moves.load(Ordering::SeqCst), 1);
        assert_eq!(actuator.halts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unacknowledged_frame_aborts() {
        let actuator = Arc::new(CountingActuator::default());
        let config = PrintConfig {
            display_timeout_ms: 30,
            ..config()
        };
        let controller = PrintController::new(
            config,
            slab(5),
            Arc::new(FrameStore::new(AckMode::Manual)),
            actuator.clone(),
            &StopHandle::new(),
        )
        .unwrap();

        let report = run_bounded(controller).await;
        assert_eq!(report.outcome, PrintState::Aborted(AbortReason::DisplayTimeout));
        assert_eq!(actuator.inner.moves(), 0);
        assert_eq!(actuator.halts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_manual_acknowledgment_drives_layers() {
        let actuator = Arc::new(CountingActuator::default());
        let display = Arc::new(FrameStore::new(AckMode::Manual));
        let controller = PrintController::new(
            config(),
            slab(2),
            display.clone(),
            actuator.clone(),
            &StopHandle::new(),
        )
        .unwrap();
        let mut states = controller.subscribe_state();
        let job = tokio::spawn(controller.run());

        for expected in 1..=2u64 {
            states
                .wait_for(|s| matches!(s, PrintState::AwaitingAcknowledgment { sequence_id, .. } if *sequence_id == expected))
                .await
                .unwrap();
            assert_eq!(display.acknowledge_current(), Some(expected));
        }

        let report = tokio::time::timeout(Duration::from_secs(5), job).await.unwrap().unwrap();
        assert_eq!(report.outcome, PrintState::Done(Completion::Finished));
        assert_eq!(actuator.inner.moves(), 2);
    }

    #[tokio::test]
    async fn test_stop_while_waiting() {
        let actuator = Arc::new(CountingActuator::default());
        let stop = StopHandle::new();
        let controller = PrintController::new(
            PrintConfig {
                display_timeout_ms: 60_000,
                ..config()
            },
            slab(5),
            Arc::new(FrameStore::new(AckMode::Manual)),
            actuator.clone(),
            &stop,
        )
        .unwrap();
        let mut states = controller.subscribe_state();
        let job = tokio::spawn(controller.run());

        states
            .wait_for(|s| matches!(s, PrintState::AwaitingAcknowledgment { .. }))
            .await
            .unwrap();
        stop.request_stop();

        let report = tokio::time::timeout(Duration::from_secs(5), job).await.unwrap().unwrap();
        assert_eq!(report.outcome, PrintState::Done(Completion::Stopped));
        assert_eq!(report.exit_code(), 0);
        assert_eq!(actuator.inner.moves(), 0);
        assert_eq!(actuator.halts.load(Ordering::SeqCst), 1);
        assert_eq!(*states.borrow(), PrintState::Done(Completion::Stopped));
    }

    #[tokio::test]
    async fn test_model_error_aborts() {
        let actuator = Arc::new(CountingActuator::default());
        let controller = PrintController::new(
            config(),
            Arc::new(Slab {
                layers: 5,
                fail_at: Some(1),
            }),
            Arc::new(FrameStore::new(AckMode::Timer)),
            actuator.clone(),
            &StopHandle::new(),
        )
        .unwrap();

        let report = run_bounded(controller).await;
        assert!(matches!(report.outcome, PrintState::Aborted(AbortReason::Model(_))));
        assert_eq!(report.layers, 1);
        assert_eq!(actuator.halts.load(Ordering::SeqCst), 1);
    }

    /// Display that refuses every frame.
    struct BrokenDisplay {
        acks: watch::Sender<u64>,
    }

    impl DisplaySink for BrokenDisplay {
        fn publish(&self, _frame: Arc<Frame>) -> std::result::Result<(), crate::error::DisplayError> {
            Err(crate::error::DisplayError::Rejected("projector offline".into()))
        }

        fn poll_status(&self) -> Option<crate::display::DisplayStatus> {
            None
        }

        fn subscribe_acknowledgments(&self) -> watch::Receiver<u64> {
            self.acks.subscribe()
        }
    }

    #[tokio::test]
    async fn test_display_fault_aborts() {
        let actuator = Arc::new(CountingActuator::default());
        let (acks, _) = watch::channel(0);
        let controller = PrintController::new(
            config(),
            slab(5),
            Arc::new(BrokenDisplay { acks }),
            actuator.clone(),
            &StopHandle::new(),
        )
        .unwrap();

        let report = run_bounded(controller).await;
        match report.outcome {
            PrintState::Aborted(AbortReason::DisplayFault(msg)) => assert!(msg.contains("projector offline")),
            other => panic!("expected display fault, got {other:?}"),
        }
        assert_eq!(actuator.inner.moves(), 0);
        assert_eq!(actuator.halts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = PrintController::new(
            PrintConfig {
                layer_step: -1.0,
                ..config()
            },
            slab(1),
            Arc::new(FrameStore::default()),
            Arc::new(SimulatedActuator::new()),
            &StopHandle::new(),
        )
        .unwrap_err();
        assert!(matches!(err, crate::error::ControlError::Config(_)));
    }
}
