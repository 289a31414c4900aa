use ballotproof::*;
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Failure body returned by ballotproofd
#[derive(Deserialize, Debug, Clone)]
struct ErrorResp {
    message: String,
}

fn decode<T: DeserializeOwned>(res: Response) -> anyhow::Result<T> {
    let status = res.status();
    if status.is_success() {
        return Ok(res.json()?);
    }

    match res.json::<ErrorResp>() {
        Ok(body) => anyhow::bail!("{} ({})", body.message, status),
        Err(_) => anyhow::bail!("server answered {}", status),
    }
}

fn get<T: DeserializeOwned>(base_uri: &str, path: &str) -> anyhow::Result<T> {
    let full_uri = format!("{}{}", base_uri, path);
    let res = Client::new().get(&full_uri).send()?;
    decode(res)
}

fn post<B: Serialize, T: DeserializeOwned>(
    base_uri: &str,
    path: &str,
    body: &B,
) -> anyhow::Result<T> {
    let full_uri = format!("{}{}", base_uri, path);
    let res = Client::new().post(&full_uri).json(body).send()?;
    decode(res)
}

pub fn get_status(base_uri: &str) -> anyhow::Result<ElectionStatusResponse> {
    get(base_uri, "/api/status")
}

pub fn get_candidates(base_uri: &str) -> anyhow::Result<Vec<Candidate>> {
    get(base_uri, "/api/candidates")
}

pub fn get_audit_log(base_uri: &str) -> anyhow::Result<Vec<AuditRecord>> {
    get(base_uri, "/api/audit-log")
}

pub fn verify_proof(base_uri: &str, proof_id: &str) -> anyhow::Result<VerifyProofResponse> {
    get(base_uri, &format!("/api/verify/{}", proof_id))
}

pub fn verify_identity(
    base_uri: &str,
    request: &VerifyIdentityRequest,
) -> anyhow::Result<VerifyIdentityResponse> {
    post(base_uri, "/api/auth/verify-qr", request)
}

pub fn bind_wallet(
    base_uri: &str,
    request: &BindWalletRequest,
) -> anyhow::Result<BindWalletResponse> {
    post(base_uri, "/api/auth/bind-wallet", request)
}

pub fn cast_vote(base_uri: &str, request: &CastVoteRequest) -> anyhow::Result<CastVoteResponse> {
    post(base_uri, "/api/cast", request)
}
