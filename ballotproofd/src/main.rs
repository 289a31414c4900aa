use ballotproof::*;
use db::{Service, SharedService};
use log::{error, info};
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::{Build, Request, Rocket, State};
use serde::Serialize;
use std::sync::Arc;

#[macro_use]
extern crate rocket;

mod config;
mod db;

/// Body of every failed request
#[derive(Serialize, Debug)]
struct ErrorBody {
    success: bool,
    message: String,
    kind: ErrorKind,
}

#[derive(Debug)]
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

fn status_for(kind: ErrorKind) -> Status {
    match kind {
        ErrorKind::Validation => Status::BadRequest,
        ErrorKind::Authentication => Status::Forbidden,
        ErrorKind::StateConflict => Status::Forbidden,
        ErrorKind::NotFound => Status::NotFound,
        ErrorKind::Storage => Status::ServiceUnavailable,
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let kind = self.0.kind();
        if kind == ErrorKind::Storage {
            error!("{} {} failed: {}", request.method(), request.uri(), self.0);
        }

        let body = ErrorBody {
            success: false,
            message: self.0.to_string(),
            kind,
        };
        (status_for(kind), Json(body)).respond_to(request)
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Run a service call on the blocking pool; store calls lock and fsync
async fn blocking<T, F>(service: &State<SharedService>, f: F) -> ApiResult<T>
where
    F: FnOnce(&Service) -> Result<T, Error> + Send + 'static,
    T: Send + 'static,
{
    let service = Arc::clone(service.inner());
    match rocket::tokio::task::spawn_blocking(move || f(&service)).await {
        Ok(result) => Ok(Json(result?)),
        Err(e) => {
            let failure = StoreError::Unavailable(format!("request worker failed: {}", e));
            Err(ApiError(failure.into()))
        }
    }
}

#[get("/")]
async fn index() -> &'static str {
    "ballotproofd is running"
}

#[post("/api/auth/verify-qr", data = "<request>")]
async fn verify_qr(
    service: &State<SharedService>,
    request: Json<VerifyIdentityRequest>,
) -> ApiResult<VerifyIdentityResponse> {
    let request = request.into_inner();
    blocking(service, move |service| service.verify_identity(&request)).await
}

#[post("/api/auth/bind-wallet", data = "<request>")]
async fn bind_wallet(
    service: &State<SharedService>,
    request: Json<BindWalletRequest>,
) -> ApiResult<BindWalletResponse> {
    let request = request.into_inner();
    blocking(service, move |service| service.bind_wallet(&request)).await
}

#[post("/api/cast", data = "<request>")]
async fn cast(
    service: &State<SharedService>,
    request: Json<CastVoteRequest>,
) -> ApiResult<CastVoteResponse> {
    let request = request.into_inner();
    blocking(service, move |service| service.cast_vote(&request)).await
}

#[get("/api/candidates")]
async fn candidates(service: &State<SharedService>) -> ApiResult<Vec<Candidate>> {
    blocking(service, |service| service.results()).await
}

#[get("/api/status")]
async fn status(service: &State<SharedService>) -> Json<ElectionStatusResponse> {
    Json(service.election_status())
}

#[get("/api/verify/<proof_id>")]
async fn verify(service: &State<SharedService>, proof_id: &str) -> ApiResult<VerifyProofResponse> {
    let proof_id = proof_id.to_owned();
    blocking(service, move |service| service.verify_proof(&proof_id)).await
}

#[get("/api/audit-log")]
async fn audit_log(service: &State<SharedService>) -> ApiResult<Vec<AuditRecord>> {
    blocking(service, |service| service.audit_log()).await
}

// Bodies rocket rejects before a handler runs (bad JSON, unknown routes) get the same shape
#[catch(default)]
fn default_catcher(status: Status, _request: &Request) -> (Status, Json<ErrorBody>) {
    let kind = match status.code {
        404 => ErrorKind::NotFound,
        500..=599 => ErrorKind::Storage,
        _ => ErrorKind::Validation,
    };
    let body = ErrorBody {
        success: false,
        message: format!("ballotproofd: {}", status.reason_lossy()),
        kind,
    };
    (status, Json(body))
}

fn build(config: config::Config) -> Rocket<Build> {
    info!(
        "election window {} .. {}{}",
        iso_timestamp(&config.election.window.start),
        iso_timestamp(&config.election.window.end),
        if config.election.window.always_open {
            " (demo mode: always open)"
        } else {
            ""
        }
    );

    rocket::build()
        .attach(db::stage(config))
        .mount(
            "/",
            routes![
                index,
                verify_qr,
                bind_wallet,
                cast,
                candidates,
                status,
                verify,
                audit_log
            ],
        )
        .register("/", catchers![default_catcher])
}

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = config::Config::from_env()?;
    if let Err(e) = build(config).launch().await {
        anyhow::bail!("ballotproofd: launch failed: {}", e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rocket::http::ContentType;
    use rocket::local::blocking::Client;

    fn client(dir: &tempfile::TempDir) -> Client {
        let seed_path = dir.path().join("seed.json");
        let store = MemStore::new();
        store.insert_voter(Voter::new("CSE2024001", "TOKEN_ALPHA_123"));
        store.insert_candidate(Candidate::new(1, "Ivanvo"));
        store.insert_candidate(Candidate::new(2, "Kabilashini"));
        std::fs::write(&seed_path, serde_json::to_vec(&store.snapshot()).unwrap()).unwrap();

        let now = Utc::now();
        let config = config::Config {
            db_path: dir.path().join("ledger.json"),
            seed_path: Some(seed_path),
            election: ElectionConfig::new(ElectionWindow::new(
                now - Duration::hours(1),
                now + Duration::hours(1),
            )),
        };
        Client::tracked(build(config)).unwrap()
    }

    #[test]
    fn bind_cast_and_verify_over_http() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(&dir);
        let (key, address) = generate_wallet();

        let message =
            Intent::bind_wallet("CSE2024001", Utc::now(), &generate_nonce()).to_string();
        let bind = BindWalletRequest {
            voter_id: "CSE2024001".into(),
            token: "TOKEN_ALPHA_123".into(),
            wallet_address: address.to_string(),
            signature: sign_message(&key, &message).unwrap(),
            message,
        };
        let response = client.post("/api/auth/bind-wallet").json(&bind).dispatch();
        assert_eq!(response.status(), Status::Ok);

        let message =
            Intent::cast_vote("CSE2024001", 2, Utc::now(), &generate_nonce()).to_string();
        let cast = CastVoteRequest {
            voter_id: "CSE2024001".into(),
            token: "TOKEN_ALPHA_123".into(),
            candidate_id: Some(2),
            wallet_address: address.to_string(),
            signature: sign_message(&key, &message).unwrap(),
            message,
        };
        let response = client.post("/api/cast").json(&cast).dispatch();
        assert_eq!(response.status(), Status::Ok);
        let receipt: CastVoteResponse = response.into_json().unwrap();

        let uri = format!("/api/verify/{}", receipt.proof_id);
        let response = client.get(uri.as_str()).dispatch();
        let verified: VerifyProofResponse = response.into_json().unwrap();
        assert!(verified.valid);
        assert_eq!(verified.wallet_address, Some(address));

        // Second ballot from the same voter
        let response = client.post("/api/cast").json(&cast).dispatch();
        assert_eq!(response.status(), Status::Forbidden);
        let body: serde_json::Value = response.into_json().unwrap();
        assert_eq!(body["success"], false);

        let candidates: Vec<Candidate> = client
            .get("/api/candidates")
            .dispatch()
            .into_json()
            .unwrap();
        assert_eq!(candidates[1].votes, 1);
    }

    #[test]
    fn failed_write_answers_service_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(&dir);
        let (key, address) = generate_wallet();

        let message =
            Intent::bind_wallet("CSE2024001", Utc::now(), &generate_nonce()).to_string();
        let bind = BindWalletRequest {
            voter_id: "CSE2024001".into(),
            token: "TOKEN_ALPHA_123".into(),
            wallet_address: address.to_string(),
            signature: sign_message(&key, &message).unwrap(),
            message,
        };
        let response = client.post("/api/auth/bind-wallet").json(&bind).dispatch();
        assert_eq!(response.status(), Status::Ok);

        let message =
            Intent::cast_vote("CSE2024001", 1, Utc::now(), &generate_nonce()).to_string();
        let cast = CastVoteRequest {
            voter_id: "CSE2024001".into(),
            token: "TOKEN_ALPHA_123".into(),
            candidate_id: Some(1),
            wallet_address: address.to_string(),
            signature: sign_message(&key, &message).unwrap(),
            message,
        };

        // A directory in place of the temp file makes the snapshot write fail
        let blocker = dir.path().join("ledger.json.tmp");
        std::fs::create_dir(&blocker).unwrap();

        let response = client.post("/api/cast").json(&cast).dispatch();
        assert_eq!(response.status(), Status::ServiceUnavailable);
        let body: serde_json::Value = response.into_json().unwrap();
        assert_eq!(body["kind"], "storage");

        let audit: Vec<AuditRecord> = client.get("/api/audit-log").dispatch().into_json().unwrap();
        assert!(audit.is_empty());

        // The unchanged request goes through once the disk recovers
        std::fs::remove_dir(&blocker).unwrap();
        let response = client.post("/api/cast").json(&cast).dispatch();
        assert_eq!(response.status(), Status::Ok);
    }

    #[test]
    fn error_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let client = client(&dir);

        let response = client.get("/api/verify/nope").dispatch();
        assert_eq!(response.status(), Status::Ok);
        let body: serde_json::Value = response.into_json().unwrap();
        assert_eq!(body["valid"], false);
        assert_eq!(body["message"], "Invalid or non-existent Proof ID.");

        let response = client
            .post("/api/auth/verify-qr")
            .header(ContentType::JSON)
            .body(r#"{"voterId":"CSE2024001","token":"wrong"}"#)
            .dispatch();
        assert_eq!(response.status(), Status::Forbidden);
        let body: serde_json::Value = response.into_json().unwrap();
        assert_eq!(body["kind"], "authentication");

        let response = client
            .post("/api/cast")
            .header(ContentType::JSON)
            .body(r#"{"voterId":"CSE2024001"}"#)
            .dispatch();
        assert_eq!(response.status(), Status::BadRequest);
        let body: serde_json::Value = response.into_json().unwrap();
        assert_eq!(body["kind"], "validation");

        let response = client.get("/api/status").dispatch();
        let body: serde_json::Value = response.into_json().unwrap();
        assert_eq!(body["phase"], "ONGOING");
        assert_eq!(body["demoMode"], false);
    }
}
