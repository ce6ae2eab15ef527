use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{KVError, KVResult, KVStore};

/// Encodes a record as MessagePack with named fields.
pub fn encode_record<T: Serialize>(value: &T) -> KVResult<Vec<u8>> {
    rmp_serde::to_vec_named(value).map_err(|e| KVError::Serialization(e.to_string()))
}

/// Decodes a MessagePack record produced by [`encode_record`].
pub fn decode_record<T: DeserializeOwned>(data: &[u8]) -> KVResult<T> {
    rmp_serde::from_slice(data).map_err(|e| KVError::Serialization(e.to_string()))
}

/// Loads and decodes the record stored under `key`, if any.
pub fn get_record<T: DeserializeOwned>(store: &dyn KVStore, key: &str) -> KVResult<Option<T>> {
    match store.get(key)? {
        Some(data) => decode_record(&data).map(Some),
        None => Ok(None),
    }
}
