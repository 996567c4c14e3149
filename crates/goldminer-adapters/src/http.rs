//! Shared plumbing for the reqwest-based clients.

use std::time::Duration;

use goldminer_core::RunContext;
use reqwest::{Client, RequestBuilder};

use crate::error::{AdapterError, Result};

pub(crate) const USER_AGENT: &str = concat!("goldminer/", env!("CARGO_PKG_VERSION"));

/// Longest slice of an error body kept in [`AdapterError::Status`].
const BODY_EXCERPT: usize = 256;

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(AdapterError::from)
}

/// Send `request` and return the body of a 2xx response.
///
/// Resolves early with [`AdapterError::Cancelled`] when `ctx` finishes first.
pub(crate) async fn send_text(ctx: &RunContext, request: RequestBuilder) -> Result<String> {
    let call = async {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(AdapterError::Status {
                status: status.as_u16(),
                body: excerpt(&body),
            })
        }
    };

    tokio::select! {
        biased;
        cause = ctx.done() => Err(AdapterError::Cancelled(cause)),
        result = call => result,
    }
}

fn excerpt(body: &str) -> String {
    match body.char_indices().nth(BODY_EXCERPT) {
        Some((cut, _)) => format!("{}…", &body[..cut]),
        None => body.to_string(),
    }
}
