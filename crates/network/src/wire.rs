//! Wire codec for signature request/response payloads.
//!
//! Payloads are length-delimited protobuf per the platform's signature
//! request wire schema:
//!
//! ```text
//! SignatureRequest  { message: bytes = 1, justification: bytes = 2 }
//! SignatureResponse { signature: bytes = 1 }   // 96 raw BLS bytes
//! ```
//!
//! The justification rides along as off-chain evidence for the signer; the
//! signature is always computed over the message bytes alone.

use prost::Message;

/// Errors from wire encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Payload bytes are not a valid length-delimited protobuf message.
    #[error("payload decode failed: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// Request for a validator's signature over an unsigned message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignatureRequest {
    /// Canonical bytes of the unsigned message (the signing input).
    #[prost(bytes = "vec", tag = "1")]
    pub message: Vec<u8>,
    /// Opaque evidence the signer may consult before signing. Empty if absent.
    #[prost(bytes = "vec", tag = "2")]
    pub justification: Vec<u8>,
}

/// A validator's signature over the requested message.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignatureResponse {
    /// Raw 96-byte BLS signature.
    #[prost(bytes = "vec", tag = "1")]
    pub signature: Vec<u8>,
}

/// Encode a signature request with its length prefix.
pub fn encode_signature_request(request: &SignatureRequest) -> Vec<u8> {
    request.encode_length_delimited_to_vec()
}

/// Decode a length-prefixed signature request.
pub fn decode_signature_request(bytes: &[u8]) -> Result<SignatureRequest, WireError> {
    Ok(SignatureRequest::decode_length_delimited(bytes)?)
}

/// Encode a signature response with its length prefix.
pub fn encode_signature_response(response: &SignatureResponse) -> Vec<u8> {
    response.encode_length_delimited_to_vec()
}

/// Decode a length-prefixed signature response.
pub fn decode_signature_response(bytes: &[u8]) -> Result<SignatureResponse, WireError> {
    Ok(SignatureResponse::decode_length_delimited(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_roundtrip() {
        let request = SignatureRequest {
            message: vec![1, 2, 3],
            justification: vec![9, 9],
        };
        let decoded = decode_signature_request(&encode_signature_request(&request)).unwrap();
        assert_eq!(request, decoded);
    }

    #[test]
    fn test_response_roundtrip() {
        let response = SignatureResponse {
            signature: vec![7u8; 96],
        };
        let decoded = decode_signature_response(&encode_signature_response(&response)).unwrap();
        assert_eq!(response, decoded);
    }

    #[test]
    fn test_empty_justification_is_default() {
        let request = SignatureRequest {
            message: vec![1],
            justification: Vec::new(),
        };
        let decoded = decode_signature_request(&encode_signature_request(&request)).unwrap();
        assert!(decoded.justification.is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        // Length prefix claiming more bytes than present.
        assert!(decode_signature_response(&[0xFF, 0x01, 0x02]).is_err());
    }
}
