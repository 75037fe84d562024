#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tracemirror_core::{
    domain::{
        BatchResult, Exemplar, PublishAck, RemoteService, ServiceFilter,
        ServiceRecord, ServiceUpsert, StreamId, TimeWindow,
    },
    error::{CatalogError, ChannelError, RegistryError},
    ports::{CatalogClient, RegistryStore, WorkChannel},
};

/// Canned reply for one stream's time-series request.
#[derive(Debug, Clone)]
pub enum StreamReply {
    Exemplars(Vec<&'static str>),
    NoExemplarField,
    Fail,
}

#[derive(Debug, Default)]
pub struct FakeCatalog {
    services: Vec<RemoteService>,
    fail_services: bool,
    streams: Vec<StreamId>,
    replies: HashMap<String, StreamReply>,
    latency: Duration,
    services_gate: Option<Arc<Semaphore>>,

    pub service_calls: AtomicUsize,
    pub stream_list_calls: AtomicUsize,
    pub fetched: Mutex<Vec<(StreamId, TimeWindow)>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(mut self, name: &str, last_seen: &str) -> Self {
        self.services.push(RemoteService::new(name, last_seen));
        self
    }

    pub fn failing_services(mut self) -> Self {
        self.fail_services = true;
        self
    }

    pub fn with_stream(mut self, id: &str, reply: StreamReply) -> Self {
        self.streams.push(StreamId::from(id));
        self.replies.insert(id.to_string(), reply);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// `list_services` waits for a permit on `gate` before answering.
    pub fn with_services_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.services_gate = Some(gate);
        self
    }

    pub fn fetched_streams(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .fetched
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.to_string())
            .collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn list_services(&self) -> Result<Vec<RemoteService>, CatalogError> {
        self.service_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.services_gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| CatalogError::Parse("gate closed".into()))?;
            permit.forget();
        }
        if self.fail_services {
            return Err(CatalogError::Status {
                status: 502,
                body: "bad gateway".into(),
            });
        }
        Ok(self.services.clone())
    }

    async fn list_streams(&self) -> Result<Vec<StreamId>, CatalogError> {
        self.stream_list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.streams.clone())
    }

    async fn stream_exemplars(
        &self,
        stream: &StreamId,
        window: &TimeWindow,
    ) -> Result<Option<Vec<Exemplar>>, CatalogError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.fetched
            .lock()
            .unwrap()
            .push((stream.clone(), *window));

        match self.replies.get(stream.as_str()) {
            Some(StreamReply::Exemplars(ids)) => Ok(Some(
                ids.iter().map(|id| Exemplar::new(*id)).collect(),
            )),
            Some(StreamReply::NoExemplarField) => Ok(None),
            Some(StreamReply::Fail) | None => {
                Err(CatalogError::NotFound(format!("stream {stream}")))
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    rows: Mutex<BTreeMap<String, ServiceRecord>>,
    /// Size of every batch handed to `bulk_upsert`, in call order.
    pub batches: Mutex<Vec<usize>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, name: &str, last_seen: DateTime<Utc>) {
        self.rows.lock().unwrap().insert(
            name.to_string(),
            ServiceRecord {
                name: name.to_string(),
                last_seen,
                active: true,
                updated_at: last_seen,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<ServiceRecord> {
        self.rows.lock().unwrap().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistry {
    async fn bulk_upsert(
        &self,
        ops: Vec<ServiceUpsert>,
    ) -> Result<BatchResult, RegistryError> {
        self.batches.lock().unwrap().push(ops.len());

        let mut rows = self.rows.lock().unwrap();
        let mut result = BatchResult {
            submitted: ops.len(),
            ..BatchResult::default()
        };
        let now = Utc::now();
        for op in ops {
            let record = ServiceRecord {
                name: op.name.clone(),
                last_seen: op.last_seen,
                active: true,
                updated_at: now,
            };
            if rows.insert(op.name, record).is_some() {
                result.updated += 1;
            } else {
                result.inserted += 1;
            }
        }
        Ok(result)
    }

    async fn mark_stale(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RegistryError> {
        let mut rows = self.rows.lock().unwrap();
        let mut changed = 0;
        for row in rows.values_mut() {
            if row.active && row.last_seen < cutoff {
                row.active = false;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn list_services(
        &self,
        filter: ServiceFilter,
    ) -> Result<Vec<ServiceRecord>, RegistryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingChannel {
    pub published: Mutex<Vec<(String, String)>>,
    rejects: HashSet<String>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every publish of `value` fails.
    pub fn rejecting(mut self, value: &str) -> Self {
        self.rejects.insert(value.to_string());
        self
    }

    pub fn values(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(_, value)| value.clone())
            .collect()
    }
}

#[async_trait]
impl WorkChannel for RecordingChannel {
    async fn publish(
        &self,
        topic: &str,
        value: &str,
    ) -> Result<PublishAck, ChannelError> {
        if self.rejects.contains(value) {
            return Err(ChannelError::Publish(format!("rejected {value}")));
        }
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), value.to_string()));
        Ok(PublishAck { receivers: 1 })
    }
}

/// Poll `check` until it holds or the timeout elapses.
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
