use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::analysis::{AnalysisResult, CapturedImage};
use crate::error::{MeasureError, Result};
use crate::geometry::{
    pixel_distance_to_real, screen_pixel_distance, world_point_distance_cm, ArHit,
    CameraFrameContext, ScreenPoint, WorldPoint,
};
use crate::report::MeasurementReport;
use crate::sensing::ConfirmedDetection;
use crate::settings::MeasurementSettings;

use super::analysis::{AnalysisFlow, AnalysisPhase, AnalysisTicket};
use super::mode::{MeasurementAxis, MeasurementMode, TapPoint};
use super::result::{resolve_area_m2, MeasurementValues};

/// Where a session currently stands, flattened for the host.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    Idle,
    AwaitingReference,
    AwaitingMeasurement,
    Computed,
    Capturing,
    Captured,
    Analyzing,
    Reviewing,
    Closed,
}

/// What the host should prompt the user with. Text is the host's concern.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Instruction {
    Initializing,
    TapFirst { axis: MeasurementAxis },
    TapSecond { axis: MeasurementAxis },
    Result { axis: MeasurementAxis, value_cm: f64 },
    Capture,
    Analyzing,
    Review,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TapOutcome {
    ReferenceSet,
    Measured { axis: MeasurementAxis, value_cm: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TapRole {
    Next,
    Reference,
    Measurement,
}

/// The two-tap sequence. A measurement point only exists alongside its
/// reference.
#[derive(Debug, Clone, Copy, PartialEq)]
enum TapFlow<P> {
    Idle,
    AwaitingReference,
    AwaitingMeasurement { reference: P },
    Computed { reference: P, measurement: P },
}

impl<P: Copy> TapFlow<P> {
    fn phase(&self) -> SessionPhase {
        match self {
            TapFlow::Idle => SessionPhase::Idle,
            TapFlow::AwaitingReference => SessionPhase::AwaitingReference,
            TapFlow::AwaitingMeasurement { .. } => SessionPhase::AwaitingMeasurement,
            TapFlow::Computed { .. } => SessionPhase::Computed,
        }
    }

    /// Move one step. `measure` is only called once both points exist.
    fn advance(
        &mut self,
        point: P,
        role: TapRole,
        measure: impl FnOnce(&P, &P) -> f64,
    ) -> Result<Option<f64>> {
        match (*self, role) {
            (TapFlow::Idle, _) => Err(MeasureError::state("measurement flow not started")),
            (TapFlow::AwaitingReference, TapRole::Measurement) => Err(MeasureError::state(
                "measurement tap before a reference point",
            )),
            (TapFlow::AwaitingMeasurement { .. }, TapRole::Reference) => Err(
                MeasureError::state("reference already set, waiting for the second tap"),
            ),
            (TapFlow::Computed { .. }, TapRole::Measurement) => Err(MeasureError::state(
                "measurement complete, tap a new reference first",
            )),
            (TapFlow::AwaitingReference | TapFlow::Computed { .. }, _) => {
                *self = TapFlow::AwaitingMeasurement { reference: point };
                Ok(None)
            }
            (TapFlow::AwaitingMeasurement { reference }, _) => {
                let value = measure(&reference, &point);
                *self = TapFlow::Computed {
                    reference,
                    measurement: point,
                };
                Ok(Some(value))
            }
        }
    }

    fn points(&self) -> (Option<P>, Option<P>) {
        match *self {
            TapFlow::AwaitingMeasurement { reference } => (Some(reference), None),
            TapFlow::Computed {
                reference,
                measurement,
            } => (Some(reference), Some(measurement)),
            TapFlow::Idle | TapFlow::AwaitingReference => (None, None),
        }
    }

    fn restart(&mut self) {
        if !matches!(self, TapFlow::Idle) {
            *self = TapFlow::AwaitingReference;
        }
    }
}

/// Mode-specific state. Each manual mode carries its own point type.
#[derive(Debug, Clone)]
enum ModeState {
    ArTap {
        tracking_ready: bool,
        taps: TapFlow<WorldPoint>,
    },
    ScreenTap(TapFlow<ScreenPoint>),
    SensorTap(TapFlow<ScreenPoint>),
    AiAnalysis(AnalysisFlow),
}

impl ModeState {
    fn initial(mode: MeasurementMode) -> Self {
        match mode {
            MeasurementMode::ArTap => ModeState::ArTap {
                tracking_ready: false,
                taps: TapFlow::Idle,
            },
            MeasurementMode::ScreenTap => ModeState::ScreenTap(TapFlow::Idle),
            MeasurementMode::SensorTap => ModeState::SensorTap(TapFlow::Idle),
            MeasurementMode::AiAnalysis => ModeState::AiAnalysis(AnalysisFlow::new()),
        }
    }
}

/// One measurement flow, from opening the camera to save or cancel.
#[derive(Debug, Clone)]
pub struct MeasurementSession {
    id: Uuid,
    mode: MeasurementMode,
    state: ModeState,
    axis: MeasurementAxis,
    values: MeasurementValues,
    camera: CameraFrameContext,
    device_height_m: f64,
    closed: bool,
}

impl MeasurementSession {
    pub fn new(mode: MeasurementMode, camera: CameraFrameContext, device_height_m: f64) -> Self {
        let id = Uuid::new_v4();
        debug!("session {id} opened in {mode:?} mode");
        Self {
            id,
            mode,
            state: ModeState::initial(mode),
            axis: MeasurementAxis::default(),
            values: MeasurementValues::default(),
            camera,
            device_height_m,
            closed: false,
        }
    }

    /// Open a session with the configured camera for this device.
    pub fn from_settings(
        mode: MeasurementMode,
        settings: &MeasurementSettings,
        screen_width_px: u32,
        screen_height_px: u32,
        device_model: Option<&str>,
    ) -> Result<Self> {
        let camera =
            settings
                .camera
                .frame_context(screen_width_px, screen_height_px, device_model)?;
        Ok(Self::new(mode, camera, settings.camera.device_height_m))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> MeasurementMode {
        self.mode
    }

    pub fn axis(&self) -> MeasurementAxis {
        self.axis
    }

    pub fn values(&self) -> &MeasurementValues {
        &self.values
    }

    pub fn camera(&self) -> &CameraFrameContext {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut CameraFrameContext {
        &mut self.camera
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn phase(&self) -> SessionPhase {
        if self.closed {
            return SessionPhase::Closed;
        }
        match &self.state {
            ModeState::ArTap { taps, .. } => taps.phase(),
            ModeState::ScreenTap(taps) | ModeState::SensorTap(taps) => taps.phase(),
            ModeState::AiAnalysis(flow) => match flow.phase() {
                AnalysisPhase::Capturing => SessionPhase::Capturing,
                AnalysisPhase::Captured => SessionPhase::Captured,
                AnalysisPhase::Analyzing => SessionPhase::Analyzing,
                AnalysisPhase::Reviewing => SessionPhase::Reviewing,
            },
        }
    }

    /// Reference and measurement points of the current tap sequence.
    pub fn tap_points(&self) -> (Option<TapPoint>, Option<TapPoint>) {
        fn lift<P: Into<TapPoint>>((a, b): (Option<P>, Option<P>)) -> (Option<TapPoint>, Option<TapPoint>) {
            (a.map(Into::into), b.map(Into::into))
        }
        match &self.state {
            ModeState::ArTap { taps, .. } => lift(taps.points()),
            ModeState::ScreenTap(taps) | ModeState::SensorTap(taps) => lift(taps.points()),
            ModeState::AiAnalysis(_) => (None, None),
        }
    }

    pub fn analysis(&self) -> Option<&AnalysisFlow> {
        match &self.state {
            ModeState::AiAnalysis(flow) => Some(flow),
            _ => None,
        }
    }

    /// Idle → AwaitingReference for the tap modes.
    pub fn begin(&mut self) -> Result<()> {
        self.ensure_open()?;
        match &mut self.state {
            ModeState::ArTap { taps, .. } => begin_taps(taps),
            ModeState::ScreenTap(taps) | ModeState::SensorTap(taps) => begin_taps(taps),
            ModeState::AiAnalysis(_) => {}
        }
        debug!("session {} now {:?}", self.id, self.phase());
        Ok(())
    }

    pub fn set_tracking_ready(&mut self, ready: bool) {
        if let ModeState::ArTap { tracking_ready, .. } = &mut self.state {
            if *tracking_ready != ready {
                debug!("session {} AR tracking ready: {ready}", self.id);
            }
            *tracking_ready = ready;
        }
    }

    /// Latest tilt sample from the orientation sensor.
    pub fn update_tilt(&mut self, tilt_angle_degrees: f64) {
        if tilt_angle_degrees.is_finite() {
            self.camera.set_tilt(tilt_angle_degrees, self.device_height_m);
        }
    }

    /// Latest AR hit-test; refines the distance used by screen taps.
    pub fn set_ar_hit(&mut self, hit: &ArHit) {
        self.camera.set_ar_distance(hit.distance_m());
    }

    /// Switch between depth and width. Tap points are dropped; values
    /// already measured for either axis are kept.
    pub fn set_axis(&mut self, axis: MeasurementAxis) -> Result<()> {
        self.ensure_open()?;
        match &mut self.state {
            ModeState::ArTap { taps, .. } => taps.restart(),
            ModeState::ScreenTap(taps) | ModeState::SensorTap(taps) => taps.restart(),
            ModeState::AiAnalysis(_) => {
                return Err(MeasureError::state("axis applies to tap modes only"));
            }
        }
        self.axis = axis;
        debug!("session {} measuring {axis:?}", self.id);
        Ok(())
    }

    /// The next tap in sequence: reference, then measurement.
    pub fn tap(&mut self, point: impl Into<TapPoint>) -> Result<TapOutcome> {
        self.apply_tap(point.into(), TapRole::Next)
    }

    pub fn tap_reference(&mut self, point: impl Into<TapPoint>) -> Result<TapOutcome> {
        self.apply_tap(point.into(), TapRole::Reference)
    }

    pub fn tap_measurement(&mut self, point: impl Into<TapPoint>) -> Result<TapOutcome> {
        self.apply_tap(point.into(), TapRole::Measurement)
    }

    fn apply_tap(&mut self, point: TapPoint, role: TapRole) -> Result<TapOutcome> {
        self.ensure_open()?;
        let camera = &self.camera;

        let measured = match (&mut self.state, point) {
            (ModeState::ArTap { tracking_ready, taps }, TapPoint::World(p)) => {
                if !*tracking_ready {
                    return Err(MeasureError::NotReady("AR tracking not ready".into()));
                }
                taps.advance(p, role, world_point_distance_cm)?
            }
            (ModeState::ScreenTap(taps), TapPoint::Screen(p)) => taps.advance(p, role, |a, b| {
                camera.pixel_distance_to_real_cm(screen_pixel_distance(a, b))
            })?,
            (ModeState::SensorTap(taps), TapPoint::Screen(p)) => {
                let distance_m = camera
                    .tilt_distance_to_plane_m()
                    .ok_or_else(|| MeasureError::NotReady("no tilt sample yet".into()))?;
                taps.advance(p, role, |a, b| {
                    pixel_distance_to_real(
                        screen_pixel_distance(a, b),
                        camera.focal_length_px(),
                        distance_m,
                    )
                })?
            }
            (ModeState::AiAnalysis(_), _) => {
                return Err(MeasureError::state("taps are not used in analysis mode"));
            }
            (_, point) => {
                return Err(MeasureError::state(format!(
                    "{point:?} does not match {:?} mode",
                    self.mode
                )));
            }
        };

        match measured {
            None => {
                debug!("session {} reference set for {:?}", self.id, self.axis);
                Ok(TapOutcome::ReferenceSet)
            }
            Some(value_cm) => {
                self.values.record(self.axis, value_cm);
                info!(
                    "session {} measured {:?} = {value_cm:.1} cm",
                    self.id, self.axis
                );
                Ok(TapOutcome::Measured {
                    axis: self.axis,
                    value_cm,
                })
            }
        }
    }

    /// Take the width (and confidence) of a confirmed automatic detection.
    pub fn accept_detection(&mut self, detection: &ConfirmedDetection) -> Result<()> {
        self.ensure_open()?;
        match &mut self.state {
            ModeState::ArTap { taps, .. } => taps.restart(),
            ModeState::ScreenTap(taps) | ModeState::SensorTap(taps) => taps.restart(),
            ModeState::AiAnalysis(_) => {
                return Err(MeasureError::state(
                    "automatic detections apply to tap modes only",
                ));
            }
        }
        self.values.record(MeasurementAxis::Width, detection.width_cm);
        self.values.confidence = Some(detection.candidate.confidence());
        info!(
            "session {} accepted detection {:.1} cm wide",
            self.id, detection.width_cm
        );
        Ok(())
    }

    pub fn capture(&mut self, image: CapturedImage) -> Result<()> {
        self.ensure_open()?;
        self.analysis_flow_mut()?.capture(image)
    }

    pub fn begin_analysis(&mut self) -> Result<(AnalysisTicket, CapturedImage)> {
        self.ensure_open()?;
        self.analysis_flow_mut()?.begin()
    }

    /// Apply an analysis outcome. Stale tickets and closed sessions are
    /// no-ops and return false.
    pub fn complete_analysis(
        &mut self,
        ticket: AnalysisTicket,
        outcome: Result<AnalysisResult>,
    ) -> bool {
        if self.closed {
            info!("discarding analysis result for closed session {}", self.id);
            return false;
        }
        let ModeState::AiAnalysis(flow) = &mut self.state else {
            return false;
        };
        if !flow.complete(ticket, outcome) {
            return false;
        }
        if let Some(result) = flow.result() {
            let depth_cm = result.depth_cm();
            self.values = MeasurementValues {
                depth_cm,
                width_cm: result.width,
                area_m2: resolve_area_m2(result.width, depth_cm, result.area),
                confidence: result.confidence,
                description: result.description.clone(),
            };
        }
        debug!("session {} now {:?}", self.id, self.phase());
        true
    }

    /// Back to the camera; the previous photo and result are dropped.
    pub fn retake(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.analysis_flow_mut()?.retake();
        self.values.clear();
        Ok(())
    }

    /// The payload `save` would deliver, without changing state.
    pub fn report(&self) -> Result<MeasurementReport> {
        self.ensure_open()?;
        let ready = match &self.state {
            ModeState::AiAnalysis(flow) => flow.phase() == AnalysisPhase::Reviewing,
            _ => self.phase() != SessionPhase::Idle && !self.values.is_empty(),
        };
        if !ready {
            return Err(MeasureError::state("nothing measured to save"));
        }
        Ok(MeasurementReport {
            session_id: self.id,
            mode: self.mode,
            depth_cm: self.values.depth_cm,
            width_cm: self.values.width_cm,
            area_m2: self.values.area_m2,
            confidence: self.values.confidence,
            description: self.values.description.clone(),
            measured_at: Utc::now(),
        })
    }

    /// Produce the report and start over: tap modes return to `Idle`,
    /// analysis to `Capturing`.
    pub fn save(&mut self) -> Result<MeasurementReport> {
        let report = self.report()?;
        self.mark_saved();
        Ok(report)
    }

    /// AR tracking readiness belongs to the tracker and survives the save.
    pub(crate) fn mark_saved(&mut self) {
        info!("session {} saved", self.id);
        match &mut self.state {
            ModeState::ArTap { taps, .. } => *taps = TapFlow::Idle,
            state => *state = ModeState::initial(self.mode),
        }
        self.values.clear();
        self.id = Uuid::new_v4();
    }

    /// Clear points and results; the flow stays open.
    pub fn reset(&mut self) {
        if self.closed {
            return;
        }
        match &mut self.state {
            ModeState::ArTap { taps, .. } => *taps = TapFlow::AwaitingReference,
            ModeState::ScreenTap(taps) | ModeState::SensorTap(taps) => {
                *taps = TapFlow::AwaitingReference
            }
            ModeState::AiAnalysis(flow) => flow.retake(),
        }
        self.values.clear();
        debug!("session {} reset to {:?}", self.id, self.phase());
    }

    /// Close without emitting anything. Outstanding analysis is orphaned.
    pub fn cancel(&mut self) {
        if self.closed {
            return;
        }
        if let ModeState::AiAnalysis(flow) = &mut self.state {
            flow.invalidate();
        }
        self.state = ModeState::initial(self.mode);
        self.values.clear();
        self.closed = true;
        debug!("session {} cancelled", self.id);
    }

    /// Surface a hardware or permission fault. Terminal faults close the
    /// session; the error is handed back for the host to render.
    pub fn report_fault(&mut self, err: MeasureError) -> MeasureError {
        if err.is_terminal() {
            warn!("session {} closed: {err}", self.id);
            self.cancel();
        }
        err
    }

    pub fn instruction(&self) -> Instruction {
        if self.closed {
            return Instruction::Closed;
        }
        let axis = self.axis;
        match &self.state {
            ModeState::ArTap {
                tracking_ready: false,
                ..
            } => Instruction::Initializing,
            ModeState::AiAnalysis(flow) => match flow.phase() {
                AnalysisPhase::Capturing | AnalysisPhase::Captured => Instruction::Capture,
                AnalysisPhase::Analyzing => Instruction::Analyzing,
                AnalysisPhase::Reviewing => Instruction::Review,
            },
            _ => match self.phase() {
                SessionPhase::AwaitingReference => Instruction::TapFirst { axis },
                SessionPhase::AwaitingMeasurement => Instruction::TapSecond { axis },
                SessionPhase::Computed => Instruction::Result {
                    axis,
                    value_cm: self.values.get(axis).unwrap_or_default(),
                },
                _ => Instruction::Initializing,
            },
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(MeasureError::state("session closed"))
        } else {
            Ok(())
        }
    }

    fn analysis_flow_mut(&mut self) -> Result<&mut AnalysisFlow> {
        match &mut self.state {
            ModeState::AiAnalysis(flow) => Ok(flow),
            _ => Err(MeasureError::state("not an analysis session")),
        }
    }
}

fn begin_taps<P: Copy>(taps: &mut TapFlow<P>) {
    if matches!(taps, TapFlow::Idle) {
        *taps = TapFlow::AwaitingReference;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::capture::png_bytes;
    use crate::detection::types::candidate_at;
    use crate::geometry::DistanceSource;
    use crate::sensing::size_detection;
    use approx::assert_abs_diff_eq;

    fn camera() -> CameraFrameContext {
        CameraFrameContext::new(1080, 1920, 67.0).unwrap()
    }

    fn started(mode: MeasurementMode) -> MeasurementSession {
        let mut session = MeasurementSession::new(mode, camera(), 1.5);
        session.begin().unwrap();
        session
    }

    #[test]
    fn ar_taps_measure_depth() {
        let mut session = started(MeasurementMode::ArTap);
        assert_eq!(session.instruction(), Instruction::Initializing);
        assert!(matches!(
            session.tap(WorldPoint::new(0.0, 0.0, 0.0)),
            Err(MeasureError::NotReady(_))
        ));

        session.set_tracking_ready(true);
        assert_eq!(
            session.instruction(),
            Instruction::TapFirst {
                axis: MeasurementAxis::Depth
            }
        );
        assert_eq!(
            session.tap(WorldPoint::new(0.0, 0.0, 0.0)).unwrap(),
            TapOutcome::ReferenceSet
        );
        let TapOutcome::Measured { value_cm, .. } =
            session.tap(WorldPoint::new(0.0, 0.0, 0.5)).unwrap()
        else {
            panic!("second tap should measure");
        };
        assert_abs_diff_eq!(value_cm, 50.0, epsilon = 1e-9);
        assert_eq!(session.phase(), SessionPhase::Computed);
        assert_eq!(session.values().depth_cm, Some(value_cm));
    }

    #[test]
    fn screen_taps_use_best_distance() {
        let mut session = started(MeasurementMode::ScreenTap);
        session.set_axis(MeasurementAxis::Width).unwrap();
        session.tap(ScreenPoint::new(100.0, 500.0)).unwrap();
        session.tap(ScreenPoint::new(400.0, 500.0)).unwrap();
        let width = session.values().width_cm.unwrap();
        assert_abs_diff_eq!(width, 55.17, epsilon = 0.02);
        assert_eq!(session.camera().distance_source(), DistanceSource::Default);

        // AR distance now takes priority for the next measurement
        session.set_ar_hit(&ArHit {
            distance: Some(3.0),
            ..ArHit::default()
        });
        session.tap(ScreenPoint::new(100.0, 500.0)).unwrap();
        session.tap(ScreenPoint::new(400.0, 500.0)).unwrap();
        assert_abs_diff_eq!(session.values().width_cm.unwrap(), width * 2.0, epsilon = 1e-9);
    }

    #[test]
    fn sensor_taps_need_tilt() {
        let mut session = started(MeasurementMode::SensorTap);
        assert!(matches!(
            session.tap(ScreenPoint::new(0.0, 0.0)),
            Err(MeasureError::NotReady(_))
        ));
        session.update_tilt(45.0);
        session.tap(ScreenPoint::new(0.0, 0.0)).unwrap();
        let TapOutcome::Measured { value_cm, .. } =
            session.tap(ScreenPoint::new(300.0, 0.0)).unwrap()
        else {
            panic!("expected a measurement");
        };
        let f = session.camera().focal_length_px();
        assert_abs_diff_eq!(value_cm, 300.0 / f * 1.5 / 45f64.to_radians().cos() * 100.0, epsilon = 1e-6);
    }

    #[test]
    fn taps_rejected_outside_the_flow() {
        let mut idle = MeasurementSession::new(MeasurementMode::ScreenTap, camera(), 1.5);
        assert!(matches!(
            idle.tap(ScreenPoint::new(1.0, 1.0)),
            Err(MeasureError::InvalidMeasurementState(_))
        ));

        let mut session = started(MeasurementMode::ScreenTap);
        assert!(matches!(
            session.tap(WorldPoint::new(0.0, 0.0, 0.0)),
            Err(MeasureError::InvalidMeasurementState(_))
        ));
        assert!(matches!(
            session.tap_measurement(ScreenPoint::new(1.0, 1.0)),
            Err(MeasureError::InvalidMeasurementState(_))
        ));
        session.tap_reference(ScreenPoint::new(1.0, 1.0)).unwrap();
        assert!(matches!(
            session.tap_reference(ScreenPoint::new(2.0, 2.0)),
            Err(MeasureError::InvalidMeasurementState(_))
        ));
        session.tap_measurement(ScreenPoint::new(2.0, 2.0)).unwrap();
    }

    #[test]
    fn width_only_save_derives_area_and_resets() {
        let mut session = started(MeasurementMode::ArTap);
        session.set_tracking_ready(true);
        session.set_axis(MeasurementAxis::Width).unwrap();
        session.tap(WorldPoint::new(0.0, 0.0, 0.0)).unwrap();
        session.tap(WorldPoint::new(0.4, 0.0, 0.0)).unwrap();

        let first_id = session.id();
        let report = session.save().unwrap();
        assert_eq!(report.session_id, first_id);
        assert_eq!(report.depth_cm, None);
        assert_abs_diff_eq!(report.width_cm.unwrap(), 40.0, epsilon = 1e-9);
        assert_abs_diff_eq!(report.area_m2.unwrap(), 0.1257, epsilon = 1e-4);

        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(session.values().is_empty());
        assert_ne!(session.id(), first_id);
    }

    #[test]
    fn ar_tracking_survives_save() {
        let mut session = started(MeasurementMode::ArTap);
        session.set_tracking_ready(true);
        session.tap(WorldPoint::new(0.0, 0.0, 0.0)).unwrap();
        session.tap(WorldPoint::new(0.0, 0.0, 0.05)).unwrap();
        session.save().unwrap();

        session.begin().unwrap();
        assert_eq!(
            session.instruction(),
            Instruction::TapFirst {
                axis: MeasurementAxis::Depth
            }
        );
        assert_eq!(
            session.tap(WorldPoint::new(0.0, 0.0, 0.0)).unwrap(),
            TapOutcome::ReferenceSet
        );
    }

    #[test]
    fn save_without_result_is_refused() {
        let mut session = started(MeasurementMode::ScreenTap);
        assert!(matches!(
            session.save(),
            Err(MeasureError::InvalidMeasurementState(_))
        ));
        session.tap(ScreenPoint::new(1.0, 1.0)).unwrap();
        assert!(session.save().is_err());
    }

    #[test]
    fn axis_switch_keeps_both_values() {
        let mut session = started(MeasurementMode::ArTap);
        session.set_tracking_ready(true);
        session.tap(WorldPoint::new(0.0, 0.0, 0.0)).unwrap();
        session.tap(WorldPoint::new(0.0, 0.0, 0.1)).unwrap();
        session.set_axis(MeasurementAxis::Width).unwrap();
        assert_eq!(session.phase(), SessionPhase::AwaitingReference);
        session.tap(WorldPoint::new(0.0, 0.0, 0.0)).unwrap();
        session.tap(WorldPoint::new(0.3, 0.0, 0.0)).unwrap();

        let report = session.save().unwrap();
        assert_abs_diff_eq!(report.depth_cm.unwrap(), 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(report.width_cm.unwrap(), 30.0, epsilon = 1e-9);
    }

    #[test]
    fn tap_after_result_starts_new_reference() {
        let mut session = started(MeasurementMode::ScreenTap);
        session.tap(ScreenPoint::new(0.0, 0.0)).unwrap();
        session.tap(ScreenPoint::new(0.0, 100.0)).unwrap();
        assert!(matches!(session.instruction(), Instruction::Result { .. }));
        assert_eq!(
            session.tap(ScreenPoint::new(5.0, 5.0)).unwrap(),
            TapOutcome::ReferenceSet
        );
        assert_eq!(session.phase(), SessionPhase::AwaitingMeasurement);
        assert_eq!(
            session.tap_points(),
            (Some(TapPoint::Screen(ScreenPoint::new(5.0, 5.0))), None)
        );
        assert!(session.values().depth_cm.is_some());
    }

    #[test]
    fn reset_and_cancel() {
        let mut session = started(MeasurementMode::ScreenTap);
        session.tap(ScreenPoint::new(0.0, 0.0)).unwrap();
        session.tap(ScreenPoint::new(0.0, 100.0)).unwrap();
        session.reset();
        assert_eq!(session.phase(), SessionPhase::AwaitingReference);
        assert!(session.values().is_empty());

        session.tap(ScreenPoint::new(0.0, 0.0)).unwrap();
        session.cancel();
        assert!(session.is_closed());
        assert_eq!(session.instruction(), Instruction::Closed);
        assert!(session.tap(ScreenPoint::new(0.0, 0.0)).is_err());
        assert!(session.save().is_err());
    }

    #[test]
    fn terminal_fault_closes_session() {
        let mut session = started(MeasurementMode::ArTap);
        let err = session.report_fault(MeasureError::NotReady("tracking lost".into()));
        assert!(err.is_recoverable());
        assert!(!session.is_closed());
        let err = session.report_fault(MeasureError::PermissionDenied("camera".into()));
        assert!(err.is_terminal());
        assert!(session.is_closed());
    }

    #[test]
    fn accepted_detection_can_be_saved() {
        let mut session = started(MeasurementMode::ScreenTap);
        let detection = size_detection(candidate_at(0.4, 0.4, 0.2, 0.1), session.camera());
        session.accept_detection(&detection).unwrap();
        let report = session.save().unwrap();
        assert_eq!(report.width_cm, Some(detection.width_cm));
        assert_eq!(report.area_m2, Some(detection.area_m2));
    }

    #[test]
    fn analysis_flow_populates_report() {
        let mut session = MeasurementSession::new(MeasurementMode::AiAnalysis, camera(), 1.5);
        assert_eq!(session.phase(), SessionPhase::Capturing);
        assert!(session.tap(ScreenPoint::new(0.0, 0.0)).is_err());
        session
            .capture(CapturedImage::from_bytes(png_bytes(4, 4)).unwrap())
            .unwrap();
        let (ticket, _) = session.begin_analysis().unwrap();
        assert_eq!(session.instruction(), Instruction::Analyzing);

        let result = AnalysisResult {
            width: Some(40.0),
            height: Some(8.0),
            confidence: Some(0.9),
            description: Some("pothole".into()),
            ..AnalysisResult::default()
        };
        assert!(session.complete_analysis(ticket, Ok(result)));
        assert_eq!(session.phase(), SessionPhase::Reviewing);

        let report = session.save().unwrap();
        assert_eq!(report.depth_cm, Some(8.0));
        assert_abs_diff_eq!(report.area_m2.unwrap(), 0.1257, epsilon = 1e-4);
        assert_eq!(report.description.as_deref(), Some("pothole"));
        assert_eq!(session.phase(), SessionPhase::Capturing);
    }

    #[test]
    fn analysis_result_after_cancel_is_ignored() {
        let mut session = MeasurementSession::new(MeasurementMode::AiAnalysis, camera(), 1.5);
        session
            .capture(CapturedImage::from_bytes(png_bytes(4, 4)).unwrap())
            .unwrap();
        let (ticket, _) = session.begin_analysis().unwrap();
        session.cancel();
        assert!(!session.complete_analysis(ticket, Ok(AnalysisResult::default())));
        assert!(session.values().is_empty());
    }

    #[test]
    fn settings_pick_device_fov() {
        let mut settings = MeasurementSettings::default();
        settings
            .camera
            .device_fov_overrides
            .insert("Pixel 8".into(), 90.0);
        let session = MeasurementSession::from_settings(
            MeasurementMode::ScreenTap,
            &settings,
            1000,
            2000,
            Some("Pixel 8"),
        )
        .unwrap();
        assert_abs_diff_eq!(session.camera().focal_length_px(), 500.0, epsilon = 1e-9);
        assert!(MeasurementSession::from_settings(
            MeasurementMode::ScreenTap,
            &settings,
            0,
            2000,
            None
        )
        .is_err());
    }
}
