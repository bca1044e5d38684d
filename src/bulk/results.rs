//! Results populated on bulk operations.

use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

use crate::error::{KvError, Result};
use crate::execution::{
    CounterResponse, DocumentContent, GetResponse, MutationResponse, WireMutationToken,
};
use crate::transcoder::Transcoder;

/// Server-assigned document version, used for optimistic concurrency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cas(pub u64);

impl Cas {
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// The value to put on the wire, `None` when unset.
    pub(crate) fn to_wire(self) -> Option<u64> {
        (!self.is_zero()).then_some(self.0)
    }
}

impl fmt::Display for Cas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a mutation so later reads can wait for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MutationToken {
    pub bucket_name: String,
    pub vbucket_id: u16,
    pub vbucket_uuid: u64,
    pub seq_no: u64,
}

impl From<WireMutationToken> for MutationToken {
    fn from(token: WireMutationToken) -> Self {
        Self {
            bucket_name: token.bucket_name,
            vbucket_id: token.vbucket_id,
            vbucket_uuid: token.vbucket_uuid,
            seq_no: token.seq_no,
        }
    }
}

/// A fetched document.
#[derive(Debug, Clone)]
pub struct GetResult {
    cas: Cas,
    contents: Vec<u8>,
    flags: u32,
    transcoder: Arc<dyn Transcoder>,
}

impl GetResult {
    pub(crate) fn from_response(response: GetResponse, transcoder: Arc<dyn Transcoder>) -> Self {
        let contents = match response.content {
            DocumentContent::Uncompressed(bytes) => bytes,
            DocumentContent::Compressed(bytes) => {
                tracing::warn!(
                    "compressed content is not supported, passing through compressed value"
                );
                bytes
            }
        };

        Self {
            cas: Cas(response.cas),
            contents,
            flags: response.content_flags,
            transcoder,
        }
    }

    pub fn cas(&self) -> Cas {
        self.cas
    }

    /// Raw document bytes.
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Decode the document through the transcoder it was fetched with.
    pub fn content_as<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self.transcoder.decode(&self.contents, self.flags)?;
        serde_json::from_value(value).map_err(|e| KvError::Decoding(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationResult {
    pub cas: Cas,
    pub mutation_token: Option<MutationToken>,
}

impl From<MutationResponse> for MutationResult {
    fn from(response: MutationResponse) -> Self {
        Self {
            cas: Cas(response.cas),
            mutation_token: response.mutation_token.map(MutationToken::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterResult {
    pub mutation: MutationResult,
    /// Counter value after the operation.
    pub content: u64,
}

impl From<CounterResponse> for CounterResult {
    fn from(response: CounterResponse) -> Self {
        Self {
            mutation: MutationResult {
                cas: Cas(response.cas),
                mutation_token: response.mutation_token.map(MutationToken::from),
            },
            content: response.content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcoder::{JSON_FLAGS, JsonTranscoder};
    use serde_json::json;

    #[test]
    fn get_result_decodes_with_its_transcoder() {
        let result = GetResult::from_response(
            GetResponse {
                content: DocumentContent::Uncompressed(br#"{"name":"kv"}"#.to_vec()),
                content_flags: JSON_FLAGS,
                cas: 42,
            },
            Arc::new(JsonTranscoder),
        );

        assert_eq!(result.cas(), Cas(42));
        let value: serde_json::Value = result.content_as().unwrap();
        assert_eq!(value, json!({"name": "kv"}));
        assert!(matches!(
            result.content_as::<Vec<u32>>(),
            Err(KvError::Decoding(_))
        ));
    }

    #[test]
    fn zero_cas_is_not_sent() {
        assert_eq!(Cas(0).to_wire(), None);
        assert_eq!(Cas(7).to_wire(), Some(7));
    }
}
