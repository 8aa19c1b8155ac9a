//! JSON codec for the request and response channels.
//!
//! Both channels carry structured text. The codec is deliberately small so
//! that a different encoding can be swapped in at the transport boundary
//! without touching the engine: everything above this module deals in
//! decoded records only.

use crate::error::{Error, Result};
use crate::record::{TokenRequest, TokenResponse};

/// Encodes a request record for the request channel.
pub fn encode_request(request: &TokenRequest) -> Result<Vec<u8>> {
    serde_json::to_vec(request).map_err(|e| Error::MalformedMessage {
        context: format!("encoding request: {e}"),
    })
}

/// Decodes a request record received from the request channel.
pub fn decode_request(payload: &[u8]) -> Result<TokenRequest> {
    serde_json::from_slice(payload).map_err(|e| Error::MalformedMessage {
        context: format!("decoding request: {e}"),
    })
}

/// Encodes a response record for the response channel.
pub fn encode_response(response: &TokenResponse) -> Result<Vec<u8>> {
    serde_json::to_vec(response).map_err(|e| Error::MalformedMessage {
        context: format!("encoding response: {e}"),
    })
}

/// Decodes a response record received from the response channel.
pub fn decode_response(payload: &[u8]) -> Result<TokenResponse> {
    serde_json::from_slice(payload).map_err(|e| Error::MalformedMessage {
        context: format!("decoding response: {e}"),
    })
}
