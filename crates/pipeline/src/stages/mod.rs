//! Speech-facing stages

mod recognition;
mod synthesis;

pub use recognition::RecognitionStage;
pub use synthesis::SynthesisStage;
