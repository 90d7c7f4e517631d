//! Tracing subscriber setup for the `autopatch` binary.
//!
//! [`init_tracing`] installs a global subscriber filtered by `RUST_LOG`
//! (falling back to the given level), in plain or JSON format. Log lines
//! always go to stderr so command output on stdout stays clean. Only the
//! first call in a process takes effect.

use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Install the global subscriber.
///
/// * `json`: newline-delimited JSON instead of human-readable lines.
/// * `level`: verbosity used when `RUST_LOG` is unset.
pub fn init_tracing(json: bool, level: Level) {
    if subscriber(json, level, std::io::stderr).try_init().is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

fn subscriber<W>(json: bool, level: Level, writer: W) -> impl Subscriber + Send + Sync
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let layer: Box<dyn Layer<Registry> + Send + Sync> = if json {
        fmt::layer()
            .with_target(false)
            .with_writer(writer)
            .json()
            .boxed()
    } else {
        fmt::layer().with_target(false).with_writer(writer).boxed()
    };

    tracing_subscriber::registry().with(layer).with(env_filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn captured(json: bool) -> String {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let sub = subscriber(json, Level::INFO, move || writer.clone());
        tracing::subscriber::with_default(sub, || {
            tracing::warn!(stage = "build", "stage finished");
        });
        let bytes = buf.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_json_lines_go_to_configured_writer() {
        let out = captured(true);
        let line: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(line["fields"]["stage"], "build");
        assert_eq!(line["fields"]["message"], "stage finished");
    }

    #[test]
    fn test_plain_lines_go_to_configured_writer() {
        let out = captured(false);
        assert!(out.contains("stage finished"));
        assert!(out.contains("\"build\""));
        assert!(serde_json::from_str::<serde_json::Value>(out.trim()).is_err());
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
    }
}
