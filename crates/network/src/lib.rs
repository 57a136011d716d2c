//! The network contract consumed by the aggregation engine.
//!
//! Defines the [`AppRequestNetwork`] interface implemented by the production
//! p2p transport and by the in-memory backend (`network-memory`), plus the
//! wire codec for signature request/response payloads.

mod traits;
mod wire;

pub use traits::{
    AppRequestNetwork, InboundResponse, NetworkError, OutboundAppRequest, ResponseKey,
    ResponsePayload,
};
pub use wire::{
    decode_signature_request, decode_signature_response, encode_signature_request,
    encode_signature_response, SignatureRequest, SignatureResponse, WireError,
};
