pub mod retrieval;
pub mod synthesizer;

pub use retrieval::{CollectionPool, RetrievalCoordinator, RetrievalResult};
pub use synthesizer::{ABSTAIN_TEXT, Answer, AnswerSynthesizer, SourceRef, SynthesizerConfig};
