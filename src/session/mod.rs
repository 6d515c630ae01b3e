//! Measurement sessions: the tap and analysis flows that turn user input
//! into a depth/width/area report.

pub mod analysis;
pub mod controller;
pub mod mode;
pub mod result;
pub mod state;

pub use analysis::{AnalysisFlow, AnalysisPhase, AnalysisTicket};
pub use controller::MeasurementController;
pub use mode::{MeasurementAxis, MeasurementMode, TapPoint};
pub use result::{derive_area_m2, resolve_area_m2, MeasurementValues};
pub use state::{Instruction, MeasurementSession, SessionPhase, TapOutcome};
