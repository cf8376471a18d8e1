//! Logging system demonstration
//!
//! Shows the output formats and how playback code is expected to log.
//!
//! Run with:
//! ```bash
//! # Pretty format (default in debug)
//! cargo run -p core-runtime --example logging_demo
//!
//! # JSON format
//! cargo run -p core-runtime --example logging_demo -- json
//!
//! # Compact format with a custom filter
//! cargo run -p core-runtime --example logging_demo -- compact "core_runtime=trace"
//! ```

use bridge_traits::logging::{ConsoleLogger, LogLevel};
use core_runtime::logging::{
    init_logging, redact_if_sensitive, redact_stream_url, LogFormat, LoggingConfig,
};
use std::env;
use std::sync::Arc;
use tracing::{debug, info, instrument, span, trace, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::default(),
    };

    let mut config = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Trace)
        .with_pii_redaction(true)
        .with_spans(true)
        .with_logger_sink(Arc::new(ConsoleLogger::default()));

    if let Some(filter) = args.get(2) {
        config = config.with_filter(filter.clone());
    }

    init_logging(config)?;

    info!(format = ?format, "Logging initialized");

    demo_structured_fields();
    demo_redaction();
    demo_session(7).await;

    info!("Demo complete");
    Ok(())
}

fn demo_structured_fields() {
    let span = span!(Level::INFO, "structured_fields");
    let _enter = span.enter();

    info!(
        video_id = "dQw4w9WgXcQ",
        title = "Launch Recap",
        duration_ms = 212_000u64,
        "Item ready"
    );
    debug!(position_ms = 15_000u64, buffering = false, "Position update");
    warn!(backend = "engine", "Decode failure, switching backend");
}

fn demo_redaction() {
    let url = "https://rr1.cdn.example.com/videoplayback?expire=1700000000&sig=AOq0QJ8";

    // Explicit helpers for fmt output.
    info!(
        stream = %redact_stream_url(url),
        cookie = %redact_if_sensitive("cookie", "SID=abcdef"),
        "Opening stream"
    );

    // Field named `url`: the sink layer redacts it before forwarding.
    debug!(url = url, "Forwarded to host sink");
}

#[instrument]
async fn demo_session(session: u64) {
    info!("Loading item");
    tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
    trace!(attempt = 1, "Watchdog armed");
    info!("Item loaded");
}
