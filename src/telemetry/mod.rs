//! Logging setup and per-question stage timings

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt as fmt_layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::Verbosity;
use crate::errors::Stage;

/// Install the global subscriber; `RUST_LOG` wins over `verbosity`
pub fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_directive()));

    // A second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

/// Wall-clock duration of each pipeline stage for one question
#[derive(Debug, Clone)]
pub struct StageTimings {
    started: Instant,
    stages: Vec<(Stage, Duration)>,
}

impl StageTimings {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            stages: Vec::new(),
        }
    }

    /// Await `fut`, recording its duration under `stage`
    pub async fn measure<F, T>(&mut self, stage: Stage, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let begin = Instant::now();
        let output = fut.await;
        self.record(stage, begin.elapsed());
        output
    }

    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        self.stages.push((stage, elapsed));
    }

    /// Sum of every recording for `stage`
    pub fn get(&self, stage: Stage) -> Option<Duration> {
        let mut matching = self.stages.iter().filter(|(s, _)| *s == stage).peekable();
        matching.peek()?;
        Some(matching.map(|(_, d)| *d).sum())
    }

    pub fn total(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn log(&self) {
        tracing::debug!(
            total_ms = self.total().as_millis() as u64,
            stages = %self,
            "Question timings"
        );
    }
}

impl fmt::Display for StageTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (stage, elapsed)) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}ms", stage, elapsed.as_millis())?;
        }
        Ok(())
    }
}
