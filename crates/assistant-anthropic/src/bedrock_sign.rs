// SigV4 request signing for the Bedrock InvokeModel endpoint.
//
// Bedrock is authenticated with plain AWS SigV4, not a bearer token, so the
// request body and headers need to be signed before being handed to
// reqwest. `aws-sigv4` computes the signature; we just wire the resulting
// headers onto the outgoing request.

use std::time::SystemTime;

use aws_credential_types::Credentials;
use aws_sigv4::http_request::{sign, SignableBody, SignableRequest, SigningSettings};
use aws_sigv4::sign::v4;

use assistant_core::error::CoreError;

pub struct SignedHeaders {
    pub headers: Vec<(String, String)>,
}

pub fn sign_request(
    region: &str,
    access_key_id: &str,
    secret_access_key: &str,
    session_token: Option<&str>,
    url: &str,
    body: &[u8],
) -> Result<SignedHeaders, CoreError> {
    let credentials = Credentials::new(
        access_key_id,
        secret_access_key,
        session_token.map(|s| s.to_string()),
        None,
        "assistant-anthropic-bedrock",
    );
    let identity = credentials.into();

    let signing_settings = SigningSettings::default();
    let signing_params = v4::SigningParams::builder()
        .identity(&identity)
        .region(region)
        .name("bedrock")
        .time(SystemTime::now())
        .settings(signing_settings)
        .build()
        .map_err(|e| CoreError::Internal(anyhow::anyhow!("failed to build sigv4 params: {e}")))?
        .into();

    let signable_request = SignableRequest::new(
        "POST",
        url,
        std::iter::once(("content-type", "application/json")),
        SignableBody::Bytes(body),
    )
    .map_err(|e| CoreError::Internal(anyhow::anyhow!("failed to build signable request: {e}")))?;

    let (instructions, _signature) = sign(signable_request, &signing_params)
        .map_err(|e| CoreError::Internal(anyhow::anyhow!("failed to sign bedrock request: {e}")))?
        .into_parts();

    let mut headers = vec![("content-type".to_string(), "application/json".to_string())];
    for (name, value) in instructions.headers() {
        headers.push((name.to_string(), value.to_string()));
    }

    Ok(SignedHeaders { headers })
}
