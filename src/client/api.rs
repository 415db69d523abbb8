//! HTTP boundary — caller identity before connect.
//!
//! The realtime channel wants a peer identity up front; this fetches it from
//! the identity endpoint the same way the wider app resolves its session
//! before opening the socket.

use serde::Deserialize;

use crate::client::error::ClientError;

/// Identity returned by `GET /api/auth/me`.
#[derive(Debug, Deserialize)]
pub struct Identity {
    pub id: String,
}

/// Resolve the authenticated caller's peer identity.
///
/// `credential` travels in the `x-peer-id` header, standing in for the
/// session cookie of the full application.
///
/// # Errors
///
/// `TransportError` when the endpoint is unreachable or rejects the call.
pub async fn fetch_identity(
    http: &reqwest::Client,
    base_url: &str,
    credential: &str,
) -> Result<Identity, ClientError> {
    let fetched: Result<Identity, reqwest::Error> = async {
        http.get(format!("{base_url}/api/auth/me"))
            .header("x-peer-id", credential)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
    .await;

    fetched.map_err(|e| ClientError::TransportError(e.to_string()))
}
