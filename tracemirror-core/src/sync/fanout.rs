use chrono::Utc;
use futures::{StreamExt, stream};
use serde::Serialize;
use std::{fmt, sync::Arc};
use tracing::{Instrument, Span, debug, error, field, info, info_span, warn};

use crate::{
    domain::{LookbackWindow, StreamId, TimeWindow},
    error::SyncError,
    ports::{CatalogClient, WorkChannel},
};

use super::retry::RetryPolicy;

/// Aggregate outcome of one fan-out pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanOutReport {
    pub streams: usize,
    /// Streams whose exemplar fetch failed or that lost at least one publish.
    pub failed_streams: usize,
    pub exemplars: usize,
    pub published: usize,
    pub publish_failures: usize,
}

impl FanOutReport {
    pub fn had_errors(&self) -> bool {
        self.failed_streams > 0 || self.publish_failures > 0
    }

    fn absorb(&mut self, outcome: StreamOutcome) {
        self.exemplars += outcome.exemplars;
        self.published += outcome.published;
        self.publish_failures += outcome.publish_failures;
        if outcome.fetch_failed || outcome.publish_failures > 0 {
            self.failed_streams += 1;
        }
    }
}

#[derive(Debug, Default)]
struct StreamOutcome {
    fetch_failed: bool,
    exemplars: usize,
    published: usize,
    publish_failures: usize,
}

/// Discovers exemplar span ids on every saved stream and forwards them to
/// the work channel.
pub struct StreamFanOut {
    catalog: Arc<dyn CatalogClient>,
    channel: Arc<dyn WorkChannel>,
    window: LookbackWindow,
    topic: String,
    max_concurrent: usize,
    retry: RetryPolicy,
}

impl fmt::Debug for StreamFanOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamFanOut")
            .field("window", &self.window)
            .field("topic", &self.topic)
            .field("max_concurrent", &self.max_concurrent)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl StreamFanOut {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        channel: Arc<dyn WorkChannel>,
        window: LookbackWindow,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            channel,
            window,
            topic: topic.into(),
            max_concurrent: 8,
            retry: RetryPolicy::default(),
        }
    }

    /// Zero is treated as one.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// List streams, then process each one with bounded concurrency. Returns
    /// once every stream has finished; per-stream failures are counted in
    /// the report rather than returned.
    pub async fn fan_out(&self) -> Result<FanOutReport, SyncError> {
        let streams = match self.catalog.list_streams().await {
            Ok(streams) => streams,
            Err(err) => {
                Span::current().record("error", true);
                error!(error = %err, "failed to list streams");
                return Err(err.into());
            }
        };

        let mut report = FanOutReport {
            streams: streams.len(),
            ..FanOutReport::default()
        };
        if streams.is_empty() {
            info!("no streams to fan out");
            return Ok(report);
        }

        // Resolved once so every stream in the pass queries the same window.
        let window = match self.window.resolve(Utc::now()) {
            Ok(window) => window,
            Err(err) => {
                Span::current().record("error", true);
                error!(error = %err, "cannot resolve exemplar window");
                return Err(err.into());
            }
        };
        info!(
            streams = streams.len(),
            oldest = %window.oldest,
            youngest = %window.youngest,
            "fanning out streams"
        );

        let pending: Vec<_> = streams
            .iter()
            .map(|stream| self.process_stream(stream, window))
            .collect();
        let outcomes: Vec<StreamOutcome> = stream::iter(pending)
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        for outcome in outcomes {
            report.absorb(outcome);
        }

        if report.had_errors() {
            Span::current().record("error", true);
            warn!(
                streams = report.streams,
                failed_streams = report.failed_streams,
                published = report.published,
                publish_failures = report.publish_failures,
                "stream fan-out finished with errors"
            );
        } else {
            info!(
                streams = report.streams,
                exemplars = report.exemplars,
                published = report.published,
                "stream fan-out finished"
            );
        }
        Ok(report)
    }

    async fn process_stream(
        &self,
        stream: &StreamId,
        window: TimeWindow,
    ) -> StreamOutcome {
        let span = info_span!(
            "sync_stream",
            stream.id = %stream,
            error = field::Empty
        );

        async move {
            let mut outcome = StreamOutcome::default();

            let exemplars =
                match self.catalog.stream_exemplars(stream, &window).await {
                    Ok(Some(exemplars)) => exemplars,
                    Ok(None) => {
                        debug!("response carried no exemplars");
                        return outcome;
                    }
                    Err(err) => {
                        Span::current().record("error", true);
                        warn!(error = %err, "failed to fetch stream exemplars");
                        outcome.fetch_failed = true;
                        return outcome;
                    }
                };
            outcome.exemplars = exemplars.len();

            // Sequential within a stream so publishes keep list order.
            for exemplar in &exemplars {
                let published = self
                    .retry
                    .run(|| self.channel.publish(&self.topic, &exemplar.span_guid))
                    .await;
                match published {
                    Ok(_) => outcome.published += 1,
                    Err(err) => {
                        warn!(
                            span_guid = %exemplar.span_guid,
                            attempts = self.retry.max_attempts(),
                            error = %err,
                            "dropping exemplar after exhausting publish attempts"
                        );
                        outcome.publish_failures += 1;
                    }
                }
            }

            if outcome.publish_failures > 0 {
                Span::current().record("error", true);
            }
            debug!(
                exemplars = outcome.exemplars,
                published = outcome.published,
                "stream processed"
            );
            outcome
        }
        .instrument(span)
        .await
    }
}
