//! Groups a mixed event list into same-audience batches.
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use crate::audience::MembershipPayload;

const KEY_SEPARATOR: char = '\u{1f}';

/// Events sharing one batch key, with their positions in the input.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition<P> {
    pub key: String,
    pub positions: Vec<usize>,
    pub payloads: Vec<P>,
}

/// Grouping key: the audience key followed by the values of the declared
/// batch key fields. The audience key is always part of it, so one
/// partition never spans two segments.
pub fn batch_key<P: MembershipPayload>(payload: &P) -> String {
    let mut key = payload.audience_key().to_string();
    let fields = payload.batch_keys();
    if fields.is_empty() {
        return key;
    }
    // Payload types serialize infallibly; on error only the audience key groups.
    let value = match serde_json::to_value(payload) {
        Ok(value) => value,
        Err(err) => {
            warn!(?err, "payload not serializable; grouping by audience key only");
            return key;
        }
    };
    for field in fields {
        key.push(KEY_SEPARATOR);
        match value.get(field) {
            Some(Value::String(s)) => key.push_str(s),
            Some(Value::Null) | None => {}
            Some(other) => key.push_str(&other.to_string()),
        }
    }
    key
}

/// Partitions in order of first appearance; positions keep input order.
pub fn partition_by_batch_keys<P: MembershipPayload + Clone>(payloads: &[P]) -> Vec<Partition<P>> {
    let mut partitions: Vec<Partition<P>> = Vec::new();
    let mut lookup: HashMap<String, usize> = HashMap::new();

    for (index, payload) in payloads.iter().enumerate() {
        let key = batch_key(payload);
        let slot = match lookup.get(&key) {
            Some(&slot) => slot,
            None => {
                partitions.push(Partition {
                    key: key.clone(),
                    positions: Vec::new(),
                    payloads: Vec::new(),
                });
                lookup.insert(key, partitions.len() - 1);
                partitions.len() - 1
            }
        };
        partitions[slot].positions.push(index);
        partitions[slot].payloads.push(payload.clone());
    }
    partitions
}
