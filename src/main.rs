//! Service entry point: wires the shared state and runs the reconciliation
//! sweeper. Webhook ingestion is mounted by the HTTP layer in front of this
//! process and calls into `calltrack::handle_calendar_event` directly.

use std::sync::Arc;

use calltrack::alerts::LogAlerter;
use calltrack::state::AppState;
use calltrack::sweeper::Sweeper;
use calltrack::transcript::{HttpTranscriptProvider, TranscriptPipeline};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let state = Arc::new(AppState::new());

    let base_url = state.fresh_config().transcript_provider_base_url;
    let sweeper = Arc::new(Sweeper::new(
        state,
        Arc::new(HttpTranscriptProvider::new(&base_url)),
        Arc::new(TranscriptPipeline),
        Arc::new(LogAlerter),
    ));

    sweeper.run().await;
}
