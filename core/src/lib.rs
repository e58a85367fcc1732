pub mod constants;
pub mod error;
pub mod fitness;
pub mod frames;
pub mod movie;
pub mod outcome;
pub mod params;
pub mod representation;

pub use error::DecodeError;
pub use fitness::FitnessFunction;
pub use frames::{Button, FrameEvents, InputSummary};
pub use movie::{MovieCodec, MovieHeader, MovieOptions};
pub use outcome::{Outcome, OutcomeStatus};
pub use params::{Configuration, ParamDomain, ParamValue, Parameter, ParameterSpace};
pub use representation::{Encoding, Representation, RepresentationKind};
