pub mod mock;

use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use actix_web::{
    App, HttpRequest, HttpResponse, HttpServer, Responder, get, post, web,
};
use loader::{LoadState, ReqwestTransport, telemetry};
use reqwest::StatusCode;
use tracing_log::LogTracer;
use tracing_subscriber::util::SubscriberInitExt;

pub use mock::{Gate, RecordedRequest, ScriptedResponse, ScriptedTransport};

/// How long `/api/slow` waits before responding.
pub const SLOW_RESPONSE: Duration = Duration::from_secs(30);

/// A throwaway HTTP server on an OS-assigned port.
pub struct TestServer {
    #[allow(unused)]
    pub port: u16,
    pub address: String,
    hits: Arc<AtomicUsize>,
}

impl TestServer {
    /// A transport that resolves `/api/...` locators against this server.
    pub fn transport(&self) -> ReqwestTransport {
        ReqwestTransport::new().base_url(&self.address)
    }

    /// Number of requests the server has received on any route.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

struct Hits(Arc<AtomicUsize>);

impl Hits {
    fn record(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[get("/items")]
async fn items(hits: web::Data<Hits>) -> impl Responder {
    hits.record();
    HttpResponse::Ok().json(serde_json::json!({ "id": 1 }))
}

#[get("/not-json")]
async fn not_json(hits: web::Data<Hits>) -> impl Responder {
    hits.record();
    HttpResponse::Ok().content_type("text/plain").body("not-json")
}

#[get("/status/{code}")]
async fn status(
    hits: web::Data<Hits>,
    code: web::Path<u16>,
) -> impl Responder {
    hits.record();
    let status = actix_web::http::StatusCode::from_u16(code.into_inner())
        .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).body("this body is never read")
}

#[get("/slow")]
async fn slow(hits: web::Data<Hits>) -> impl Responder {
    hits.record();
    tokio::time::sleep(SLOW_RESPONSE).await;
    HttpResponse::Ok().json(serde_json::json!({ "id": 2 }))
}

#[post("/echo")]
async fn echo(
    hits: web::Data<Hits>,
    body: web::Json<serde_json::Value>,
) -> impl Responder {
    hits.record();
    HttpResponse::Ok().json(body.into_inner())
}

/// Echo back the `x-client` and `authorization` request headers.
#[get("/headers")]
async fn headers(
    hits: web::Data<Hits>,
    request: HttpRequest,
) -> impl Responder {
    hits.record();
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    HttpResponse::Ok().json(serde_json::json!({
        "client": header("x-client"),
        "authorization": header("authorization"),
    }))
}

fn init_tracing() {
    static TRACING: Once = Once::new();
    TRACING.call_once(|| {
        let subscriber = telemetry::get_subscriber("error");
        let _ = LogTracer::init();
        let _ = subscriber.try_init();
    });
}

/// Start a server exposing the fixture routes under `/api`.
pub async fn spawn_server() -> TestServer {
    init_tracing();

    // OS assigns the port when binding to 0
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let hits = Arc::new(AtomicUsize::new(0));

    let data = web::Data::new(Hits(hits.clone()));
    let server = HttpServer::new(move || {
        App::new()
            .service(
                web::scope("/api")
                    .service(items)
                    .service(not_json)
                    .service(status)
                    .service(slow)
                    .service(echo)
                    .service(headers),
            )
            .app_data(data.clone())
    })
    .workers(1)
    .listen(listener)
    .unwrap()
    .run();
    tokio::spawn(server);

    TestServer {
        port,
        address: format!("http://127.0.0.1:{port}"),
        hits,
    }
}

/// A transport pointed at a port nothing listens on.
pub fn unreachable_transport() -> ReqwestTransport {
    init_tracing();
    ReqwestTransport::new().base_url("http://127.0.0.1:1")
}

/// Poll `condition` until it holds, failing the test after a few seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let poll = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), poll)
        .await
        .expect("condition not met in time");
}

/// Assert that a settled state is a status failure with the given code.
pub fn assert_status_failure<T: std::fmt::Debug>(
    state: &LoadState<T>,
    expected: StatusCode,
) {
    match state {
        LoadState::Failure(error) => {
            assert_eq!(error.kind, loader::ErrorKind::Status);
            assert_eq!(error.status, Some(expected.as_u16()));
        }
        _ => panic!("Expected status failure, got {state:?}"),
    }
}
