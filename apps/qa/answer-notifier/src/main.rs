//! Answer Notifier - Entry Point
//!
//! Emails question authors when answers to their questions change.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    core_config::tracing::install_color_eyre();
    qa_answer_notifier::run().await
}
