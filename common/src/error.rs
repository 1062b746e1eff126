use thiserror::Error;

use crate::types::FetchKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("transport error: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected document shape: {0}")]
    Shape(&'static str),
    #[error("{kind} response has {found} of {required} required fields")]
    InsufficientFields {
        kind: FetchKind,
        found: usize,
        required: usize,
    },
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("`{field}` has {found} elements, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("`{field}` element {index} is not a number")]
    NotNumeric { field: &'static str, index: usize },
    #[error("history series is empty")]
    EmptySeries,
    #[error("failed to allocate {0} history samples")]
    Allocation(usize),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("http status {status}: {body}")]
    Status { status: u16, body: String },
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("no history query pending")]
    NoHistoryQuery,
}
