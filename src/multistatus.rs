//! Per-event outcomes of a batched sync call.
use serde::ser::{Serialize, SerializeSeq, Serializer};
use serde::Deserialize;
use serde_json::Value;

/// Error classification attached to a failed entry.
#[derive(Debug, Clone, Copy, serde::Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    PayloadValidationFailed,
    BadRequest,
    InvalidAuthentication,
    Forbidden,
    NotFound,
    TooManyRequests,
    RetryableError,
    UnknownError,
}

impl ErrorType {
    /// Classifies a remote (non-validation) failure by its status. Only a
    /// non-2xx batch-level status is retryable; a 5xx on a single element is
    /// an unknown rejection since elements are never retried on their own.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => ErrorType::BadRequest,
            401 => ErrorType::InvalidAuthentication,
            403 => ErrorType::Forbidden,
            404 => ErrorType::NotFound,
            429 => ErrorType::TooManyRequests,
            _ => ErrorType::UnknownError,
        }
    }
}

/// Which side of the integration produced the failure.
#[derive(Debug, Clone, Copy, serde::Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorReporter {
    Integrations,
    Destination,
}

/// Outcome for one original input position.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum BatchResult {
    Success {
        index: usize,
        status: u16,
        /// The payload as received, tagged with its index.
        sent: Value,
        /// The request body fragment sent for this event.
        body: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<Value>,
    },
    Failure {
        index: usize,
        status: u16,
        errortype: ErrorType,
        errormessage: String,
        errorreporter: ErrorReporter,
    },
}

impl BatchResult {
    pub fn index(&self) -> usize {
        match self {
            BatchResult::Success { index, .. } | BatchResult::Failure { index, .. } => *index,
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            BatchResult::Success { status, .. } | BatchResult::Failure { status, .. } => *status,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BatchResult::Success { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            BatchResult::Failure { errormessage, .. } => Some(errormessage),
            BatchResult::Success { .. } => None,
        }
    }

    fn reindexed(self, to: usize) -> Self {
        match self {
            BatchResult::Success {
                status,
                mut sent,
                body,
                response,
                ..
            } => {
                if let Some(obj) = sent.as_object_mut() {
                    obj.insert("index".into(), Value::from(to));
                }
                BatchResult::Success {
                    index: to,
                    status,
                    sent,
                    body,
                    response,
                }
            }
            BatchResult::Failure {
                status,
                errortype,
                errormessage,
                errorreporter,
                ..
            } => BatchResult::Failure {
                index: to,
                status,
                errortype,
                errormessage,
                errorreporter,
            },
        }
    }
}

/// Fixed-size table of outcomes, one slot per input event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiStatus {
    slots: Vec<Option<BatchResult>>,
}

impl MultiStatus {
    pub fn with_len(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn set_success(
        &mut self,
        index: usize,
        status: u16,
        mut sent: Value,
        body: Value,
        response: Option<Value>,
    ) {
        if let Some(obj) = sent.as_object_mut() {
            obj.insert("index".into(), Value::from(index));
        }
        self.put(BatchResult::Success {
            index,
            status,
            sent,
            body,
            response,
        });
    }

    pub fn set_error(
        &mut self,
        index: usize,
        status: u16,
        errortype: ErrorType,
        errormessage: impl Into<String>,
        errorreporter: ErrorReporter,
    ) {
        self.put(BatchResult::Failure {
            index,
            status,
            errortype,
            errormessage: errormessage.into(),
            errorreporter,
        });
    }

    /// Records the same failure for every slot.
    pub fn fail_all(
        &mut self,
        status: u16,
        errortype: ErrorType,
        errormessage: &str,
        errorreporter: ErrorReporter,
    ) {
        for index in 0..self.slots.len() {
            self.set_error(index, status, errortype, errormessage, errorreporter);
        }
    }

    fn put(&mut self, result: BatchResult) {
        let index = result.index();
        if index >= self.slots.len() {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(result);
    }

    pub fn get(&self, index: usize) -> Option<&BatchResult> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub fn success_count(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|r| r.is_success())
            .count()
    }

    pub fn failure_count(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|r| !r.is_success())
            .count()
    }

    /// Copies `other`'s outcomes into this table. Entry `i` of `other` lands
    /// at `positions[i]`.
    pub fn merge_at(&mut self, positions: &[usize], other: MultiStatus) {
        for (slot, &to) in other.slots.into_iter().zip(positions) {
            if let Some(result) = slot {
                self.put(result.reindexed(to));
            }
        }
    }

    /// Consumes the table. Slots that were never filled become 500 entries so
    /// the output always has one result per input.
    pub fn into_results(self) -> Vec<BatchResult> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or(BatchResult::Failure {
                    index,
                    status: 500,
                    errortype: ErrorType::UnknownError,
                    errormessage: "No result was recorded for this event.".into(),
                    errorreporter: ErrorReporter::Integrations,
                })
            })
            .collect()
    }
}

impl Serialize for MultiStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.slots.len()))?;
        for slot in &self.slots {
            seq.serialize_element(slot)?;
        }
        seq.end()
    }
}
