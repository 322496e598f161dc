//! Extraction of key writes from committed transactions

use std::collections::BTreeSet;

use super::errors::HistoryResult;
use super::types::KeyModification;
use crate::blockstore::TransactionEnvelope;

/// Reads per-namespace key writes out of a transaction.
pub trait TxDecoder: Send + Sync {
    /// The write of `key` in `namespace`, or `None` if the transaction did
    /// not write it.
    fn extract_key_modification(
        &self,
        envelope: &TransactionEnvelope,
        namespace: &str,
        key: &str,
    ) -> HistoryResult<Option<KeyModification>>;

    /// Distinct keys written in `namespace`, ascending.
    fn written_keys(
        &self,
        envelope: &TransactionEnvelope,
        namespace: &str,
    ) -> HistoryResult<Vec<String>>;
}

/// Decoder for transactions carrying namespace write sets.
#[derive(Debug, Default, Clone, Copy)]
pub struct RwSetDecoder;

impl TxDecoder for RwSetDecoder {
    fn extract_key_modification(
        &self,
        envelope: &TransactionEnvelope,
        namespace: &str,
        key: &str,
    ) -> HistoryResult<Option<KeyModification>> {
        let write = envelope
            .write_set(namespace)
            .and_then(|ws| ws.writes.iter().find(|w| w.key == key));

        Ok(write.map(|w| KeyModification {
            tx_id: envelope.tx_id.clone(),
            value: w.value.clone(),
            timestamp: envelope.timestamp,
            is_delete: w.is_delete,
        }))
    }

    fn written_keys(
        &self,
        envelope: &TransactionEnvelope,
        namespace: &str,
    ) -> HistoryResult<Vec<String>> {
        let keys: BTreeSet<&str> = envelope
            .write_set(namespace)
            .map(|ws| ws.writes.iter().map(|w| w.key.as_str()).collect())
            .unwrap_or_default();
        Ok(keys.into_iter().map(str::to_string).collect())
    }
}
