//! Bulk operation types.
//!
//! Each operation carries its inputs as public fields. After dispatch exactly
//! one of `result` or `err` is populated.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::results::{Cas, CounterResult, GetResult, MutationResult};
use crate::error::KvError;
use crate::observability::RequestSpanContext;
use crate::transcoder::Transcoder;
use crate::utils::cancel::RequestContext;

/// Completion hook installed by a worker, run once the op is drained.
#[derive(Default)]
pub(crate) struct Completion(Option<Box<dyn FnOnce() + Send>>);

impl Completion {
    fn set(&mut self, callback: Box<dyn FnOnce() + Send>) {
        self.0 = Some(callback);
    }

    fn run(&mut self) {
        if let Some(callback) = self.0.take() {
            callback();
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.is_some() {
            "Completion(pending)"
        } else {
            "Completion(none)"
        })
    }
}

/// Fetch a document.
#[derive(Debug, Default)]
pub struct GetOp {
    pub id: String,
    pub result: Option<GetResult>,
    pub err: Option<KvError>,
    pub(crate) finish: Completion,
}

impl GetOp {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Fetch a document and update its expiry.
#[derive(Debug, Default)]
pub struct GetAndTouchOp {
    pub id: String,
    pub expiry: Duration,
    pub result: Option<GetResult>,
    pub err: Option<KvError>,
    pub(crate) finish: Completion,
}

impl GetAndTouchOp {
    pub fn new(id: impl Into<String>, expiry: Duration) -> Self {
        Self {
            id: id.into(),
            expiry,
            ..Default::default()
        }
    }
}

/// Update a document's expiry.
#[derive(Debug, Default)]
pub struct TouchOp {
    pub id: String,
    pub expiry: Duration,
    pub result: Option<MutationResult>,
    pub err: Option<KvError>,
    pub(crate) finish: Completion,
}

impl TouchOp {
    pub fn new(id: impl Into<String>, expiry: Duration) -> Self {
        Self {
            id: id.into(),
            expiry,
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct RemoveOp {
    pub id: String,
    pub cas: Cas,
    pub result: Option<MutationResult>,
    pub err: Option<KvError>,
    pub(crate) finish: Completion,
}

impl RemoveOp {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_cas(mut self, cas: Cas) -> Self {
        self.cas = cas;
        self
    }
}

/// Create or overwrite a document.
#[derive(Debug, Default)]
pub struct UpsertOp {
    pub id: String,
    pub value: Value,
    pub expiry: Duration,
    pub result: Option<MutationResult>,
    pub err: Option<KvError>,
    pub(crate) finish: Completion,
}

impl UpsertOp {
    pub fn new(id: impl Into<String>, value: Value) -> Self {
        Self {
            id: id.into(),
            value,
            ..Default::default()
        }
    }

    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }
}

/// Create a document, failing if it exists.
#[derive(Debug, Default)]
pub struct InsertOp {
    pub id: String,
    pub value: Value,
    pub expiry: Duration,
    pub result: Option<MutationResult>,
    pub err: Option<KvError>,
    pub(crate) finish: Completion,
}

impl InsertOp {
    pub fn new(id: impl Into<String>, value: Value) -> Self {
        Self {
            id: id.into(),
            value,
            ..Default::default()
        }
    }

    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }
}

/// Overwrite an existing document.
#[derive(Debug, Default)]
pub struct ReplaceOp {
    pub id: String,
    pub value: Value,
    pub expiry: Duration,
    pub cas: Cas,
    pub result: Option<MutationResult>,
    pub err: Option<KvError>,
    pub(crate) finish: Completion,
}

impl ReplaceOp {
    pub fn new(id: impl Into<String>, value: Value) -> Self {
        Self {
            id: id.into(),
            value,
            ..Default::default()
        }
    }

    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn with_cas(mut self, cas: Cas) -> Self {
        self.cas = cas;
        self
    }
}

/// Append raw bytes to a document.
#[derive(Debug, Default)]
pub struct AppendOp {
    pub id: String,
    pub value: Vec<u8>,
    pub result: Option<MutationResult>,
    pub err: Option<KvError>,
    pub(crate) finish: Completion,
}

impl AppendOp {
    pub fn new(id: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
            ..Default::default()
        }
    }
}

/// Prepend raw bytes to a document.
#[derive(Debug, Default)]
pub struct PrependOp {
    pub id: String,
    pub value: Vec<u8>,
    pub result: Option<MutationResult>,
    pub err: Option<KvError>,
    pub(crate) finish: Completion,
}

impl PrependOp {
    pub fn new(id: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
            ..Default::default()
        }
    }
}

/// Increment a counter document.
#[derive(Debug, Default)]
pub struct IncrementOp {
    pub id: String,
    pub delta: u64,
    /// Value to create the counter with when it does not exist.
    pub initial: Option<u64>,
    pub expiry: Duration,
    pub result: Option<CounterResult>,
    pub err: Option<KvError>,
    pub(crate) finish: Completion,
}

impl IncrementOp {
    pub fn new(id: impl Into<String>, delta: u64) -> Self {
        Self {
            id: id.into(),
            delta,
            ..Default::default()
        }
    }

    pub fn with_initial(mut self, initial: u64) -> Self {
        self.initial = Some(initial);
        self
    }
}

/// Decrement a counter document.
#[derive(Debug, Default)]
pub struct DecrementOp {
    pub id: String,
    pub delta: u64,
    /// Value to create the counter with when it does not exist.
    pub initial: Option<u64>,
    pub expiry: Duration,
    pub result: Option<CounterResult>,
    pub err: Option<KvError>,
    pub(crate) finish: Completion,
}

impl DecrementOp {
    pub fn new(id: impl Into<String>, delta: u64) -> Self {
        Self {
            id: id.into(),
            delta,
            ..Default::default()
        }
    }

    pub fn with_initial(mut self, initial: u64) -> Self {
        self.initial = Some(initial);
        self
    }
}

/// One operation in a bulk batch.
#[derive(Debug)]
pub enum BulkOp {
    Get(GetOp),
    GetAndTouch(GetAndTouchOp),
    Touch(TouchOp),
    Remove(RemoveOp),
    Upsert(UpsertOp),
    Insert(InsertOp),
    Replace(ReplaceOp),
    Append(AppendOp),
    Prepend(PrependOp),
    Increment(IncrementOp),
    Decrement(DecrementOp),
}

macro_rules! each_op {
    ($value:expr, $op:ident => $body:expr) => {
        match $value {
            BulkOp::Get($op) => $body,
            BulkOp::GetAndTouch($op) => $body,
            BulkOp::Touch($op) => $body,
            BulkOp::Remove($op) => $body,
            BulkOp::Upsert($op) => $body,
            BulkOp::Insert($op) => $body,
            BulkOp::Replace($op) => $body,
            BulkOp::Append($op) => $body,
            BulkOp::Prepend($op) => $body,
            BulkOp::Increment($op) => $body,
            BulkOp::Decrement($op) => $body,
        }
    };
}

macro_rules! impl_from_op {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for BulkOp {
                fn from(op: $ty) -> Self {
                    BulkOp::$variant(op)
                }
            }
        )*
    };
}

impl_from_op!(
    Get(GetOp),
    GetAndTouch(GetAndTouchOp),
    Touch(TouchOp),
    Remove(RemoveOp),
    Upsert(UpsertOp),
    Insert(InsertOp),
    Replace(ReplaceOp),
    Append(AppendOp),
    Prepend(PrependOp),
    Increment(IncrementOp),
    Decrement(DecrementOp),
);

impl BulkOp {
    /// Operation name, used for span names and latency recording.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Get(_) => "get",
            Self::GetAndTouch(_) => "get_and_touch",
            Self::Touch(_) => "touch",
            Self::Remove(_) => "remove",
            Self::Upsert(_) => "upsert",
            Self::Insert(_) => "insert",
            Self::Replace(_) => "replace",
            Self::Append(_) => "append",
            Self::Prepend(_) => "prepend",
            Self::Increment(_) => "increment",
            Self::Decrement(_) => "decrement",
        }
    }

    pub fn id(&self) -> &str {
        each_op!(self, op => &op.id)
    }

    pub fn err(&self) -> Option<&KvError> {
        each_op!(self, op => op.err.as_ref())
    }

    pub fn is_success(&self) -> bool {
        self.err().is_none()
    }

    /// Result of a get or get-and-touch.
    pub fn get_result(&self) -> Option<&GetResult> {
        match self {
            Self::Get(op) => op.result.as_ref(),
            Self::GetAndTouch(op) => op.result.as_ref(),
            _ => None,
        }
    }

    /// Result of a touch, remove, store or append/prepend.
    pub fn mutation_result(&self) -> Option<&MutationResult> {
        match self {
            Self::Touch(op) => op.result.as_ref(),
            Self::Remove(op) => op.result.as_ref(),
            Self::Upsert(op) => op.result.as_ref(),
            Self::Insert(op) => op.result.as_ref(),
            Self::Replace(op) => op.result.as_ref(),
            Self::Append(op) => op.result.as_ref(),
            Self::Prepend(op) => op.result.as_ref(),
            Self::Increment(op) => op.result.as_ref().map(|r| &r.mutation),
            Self::Decrement(op) => op.result.as_ref().map(|r| &r.mutation),
            _ => None,
        }
    }

    pub fn counter_result(&self) -> Option<&CounterResult> {
        match self {
            Self::Increment(op) => op.result.as_ref(),
            Self::Decrement(op) => op.result.as_ref(),
            _ => None,
        }
    }

    pub(crate) fn set_finish(&mut self, callback: Box<dyn FnOnce() + Send>) {
        each_op!(self, op => op.finish.set(callback))
    }

    /// Replace any result with `err`.
    pub(crate) fn fail(&mut self, err: KvError) {
        each_op!(self, op => {
            op.result = None;
            op.err = Some(err);
        })
    }

    /// Run the completion hook installed by the worker, if any.
    pub(crate) fn finish(&mut self) {
        each_op!(self, op => op.finish.run())
    }
}

/// Options for one bulk batch.
#[derive(Debug, Clone, Default)]
pub struct BulkOpOptions {
    /// Deadline budget for the whole batch. Defaults to the collection's kv
    /// timeout multiplied by the batch length.
    pub timeout: Option<Duration>,
    /// Parent context; cancelling it cancels the batch.
    pub context: Option<RequestContext>,
    /// Overrides the collection's transcoder.
    pub transcoder: Option<Arc<dyn Transcoder>>,
    pub parent_span: Option<RequestSpanContext>,
}

impl BulkOpOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_transcoder(mut self, transcoder: Arc<dyn Transcoder>) -> Self {
        self.transcoder = Some(transcoder);
        self
    }

    pub fn with_parent_span(mut self, parent_span: RequestSpanContext) -> Self {
        self.parent_span = Some(parent_span);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn finish_runs_installed_callback_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut op = BulkOp::from(UpsertOp::new("doc", json!({"a": 1})));

        let counter = calls.clone();
        op.set_finish(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        op.finish();
        op.finish();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn accessors_dispatch_on_kind() {
        let mut inc = IncrementOp::new("counter", 2).with_initial(10);
        inc.err = Some(KvError::DocumentNotFound);
        let op = BulkOp::from(inc);

        assert_eq!(op.name(), "increment");
        assert_eq!(op.id(), "counter");
        assert!(op.get_result().is_none());
        assert!(!op.is_success());
        assert!(matches!(op.err(), Some(KvError::DocumentNotFound)));
    }
}
