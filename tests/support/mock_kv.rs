//! Scripted in-memory `KvService` for integration tests

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use kvreliable::execution::*;
use kvreliable::transcoder::JSON_FLAGS;
use kvreliable::utils::RequestContext;

/// Every call succeeds unless a failure was scripted for its key. Scripted
/// failures are consumed in order, one per call.
#[derive(Default)]
pub struct MockKv {
    failures: Mutex<HashMap<String, VecDeque<StatusCode>>>,
    calls: Mutex<Vec<(&'static str, String)>>,
    stores: Mutex<Vec<StoreRequest>>,
    delay: Option<Duration>,
    compressed: bool,
    panics: HashSet<String>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every call for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answer gets with compressed bodies.
    pub fn with_compressed_gets(mut self) -> Self {
        self.compressed = true;
        self
    }

    /// Panic inside every call made for `key`.
    pub fn panic_on(mut self, key: &str) -> Self {
        self.panics.insert(key.to_string());
        self
    }

    pub fn fail(self, key: &str, codes: impl IntoIterator<Item = StatusCode>) -> Self {
        self.failures
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .extend(codes);
        self
    }

    pub fn calls(&self) -> Vec<(&'static str, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(op, _)| *op == operation)
            .count()
    }

    pub fn stores(&self) -> Vec<StoreRequest> {
        self.stores.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn respond(&self, operation: &'static str, key: &str) -> Result<(), TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((operation, key.to_string()));
        if self.panics.contains(key) {
            panic!("{operation} on {key} blew up");
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let failure = self
            .failures
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(code) => Err(TransportError::new(
                code,
                format!("scripted {operation} failure"),
            )),
            None => Ok(()),
        }
    }

    fn document(&self, key: &str) -> GetResponse {
        let body = format!(r#"{{"id":"{key}"}}"#).into_bytes();
        GetResponse {
            content: if self.compressed {
                DocumentContent::Compressed(body)
            } else {
                DocumentContent::Uncompressed(body)
            },
            content_flags: JSON_FLAGS,
            cas: 100,
        }
    }

    fn mutation(keyspace: &Keyspace) -> MutationResponse {
        MutationResponse {
            cas: 200,
            mutation_token: Some(WireMutationToken {
                bucket_name: keyspace.bucket_name.clone(),
                vbucket_id: 7,
                vbucket_uuid: 1234,
                seq_no: 1,
            }),
        }
    }
}

#[async_trait]
impl KvService for MockKv {
    async fn get(
        &self,
        _ctx: &RequestContext,
        request: GetRequest,
    ) -> Result<GetResponse, TransportError> {
        self.respond("get", &request.key).await?;
        Ok(self.document(&request.key))
    }

    async fn get_and_touch(
        &self,
        _ctx: &RequestContext,
        request: GetAndTouchRequest,
    ) -> Result<GetResponse, TransportError> {
        self.respond("get_and_touch", &request.key).await?;
        Ok(self.document(&request.key))
    }

    async fn touch(
        &self,
        _ctx: &RequestContext,
        request: TouchRequest,
    ) -> Result<MutationResponse, TransportError> {
        self.respond("touch", &request.key).await?;
        Ok(Self::mutation(&request.keyspace))
    }

    async fn remove(
        &self,
        _ctx: &RequestContext,
        request: RemoveRequest,
    ) -> Result<MutationResponse, TransportError> {
        self.respond("remove", &request.key).await?;
        Ok(Self::mutation(&request.keyspace))
    }

    async fn upsert(
        &self,
        _ctx: &RequestContext,
        request: StoreRequest,
    ) -> Result<MutationResponse, TransportError> {
        self.respond("upsert", &request.key).await?;
        self.stores.lock().unwrap().push(request.clone());
        Ok(Self::mutation(&request.keyspace))
    }

    async fn insert(
        &self,
        _ctx: &RequestContext,
        request: StoreRequest,
    ) -> Result<MutationResponse, TransportError> {
        self.respond("insert", &request.key).await?;
        self.stores.lock().unwrap().push(request.clone());
        Ok(Self::mutation(&request.keyspace))
    }

    async fn replace(
        &self,
        _ctx: &RequestContext,
        request: StoreRequest,
    ) -> Result<MutationResponse, TransportError> {
        self.respond("replace", &request.key).await?;
        self.stores.lock().unwrap().push(request.clone());
        Ok(Self::mutation(&request.keyspace))
    }

    async fn append(
        &self,
        _ctx: &RequestContext,
        request: AdjoinRequest,
    ) -> Result<MutationResponse, TransportError> {
        self.respond("append", &request.key).await?;
        Ok(Self::mutation(&request.keyspace))
    }

    async fn prepend(
        &self,
        _ctx: &RequestContext,
        request: AdjoinRequest,
    ) -> Result<MutationResponse, TransportError> {
        self.respond("prepend", &request.key).await?;
        Ok(Self::mutation(&request.keyspace))
    }

    async fn increment(
        &self,
        _ctx: &RequestContext,
        request: CounterRequest,
    ) -> Result<CounterResponse, TransportError> {
        self.respond("increment", &request.key).await?;
        Ok(CounterResponse {
            cas: 300,
            content: request.initial.unwrap_or(0) + request.delta,
            mutation_token: None,
        })
    }

    async fn decrement(
        &self,
        _ctx: &RequestContext,
        request: CounterRequest,
    ) -> Result<CounterResponse, TransportError> {
        self.respond("decrement", &request.key).await?;
        Ok(CounterResponse {
            cas: 300,
            content: request.initial.unwrap_or(0).saturating_sub(request.delta),
            mutation_token: None,
        })
    }
}
