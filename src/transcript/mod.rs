//! Transcript provider boundary: polling client, recording→call matching,
//! and the ingest pipeline the sweeper feeds matches into.

pub mod matcher;
pub mod pipeline;
pub mod provider;

pub use matcher::match_recording_to_call;
pub use pipeline::{IngestHints, TranscriptIngest, TranscriptPipeline};
pub use provider::{HttpTranscriptProvider, ProviderError, Recording, TranscriptProvider};
