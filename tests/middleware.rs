use salvo::http::header::{COOKIE, SET_COOKIE};
use salvo::prelude::*;
use salvo::test::{ResponseExt, TestClient};
use salvo_document_session::{
    Collection, MemoryDocumentStore, SessionConfig, SessionDepotExt, SessionHandler, SessionStore,
};

const SESSION: &str = "visits";
const URL: &str = "http://127.0.0.1:5800/";

#[handler]
async fn count(depot: &mut Depot) -> String {
    let Some(registry) = depot.sessions_mut() else {
        return "no registry".to_string();
    };
    let session = match registry.get_or_new(SESSION).await {
        Ok(session) => session,
        Err(e) => return format!("error: {}", e),
    };
    let n = session.get::<i64>("count").unwrap_or(0) + 1;
    session.set("count", n).unwrap();
    n.to_string()
}

#[handler]
async fn logout(depot: &mut Depot) -> &'static str {
    let Some(registry) = depot.sessions_mut() else {
        return "no registry";
    };
    match registry.get_or_new(SESSION).await {
        Ok(session) => {
            session.destroy();
            "bye"
        }
        Err(_) => "error",
    }
}

#[handler]
async fn peek(depot: &mut Depot) -> String {
    let Some(registry) = depot.sessions_mut() else {
        return "no registry".to_string();
    };
    match registry.get(SESSION).await {
        Ok(session) => format!("new={} count={:?}", session.is_new(), session.get::<i64>("count")),
        Err(e) => format!("error: {}", e),
    }
}

fn service(documents: MemoryDocumentStore) -> Service {
    let config = SessionConfig::new("integration-hash-key").with_database("app");
    let store = SessionStore::new(documents, config).unwrap();
    let router = Router::new()
        .hoop(SessionHandler::new(store))
        .get(count)
        .push(Router::with_path("peek").get(peek))
        .push(Router::with_path("logout").get(logout));
    Service::new(router)
}

fn session_cookie(res: &Response) -> Option<cookie::Cookie<'static>> {
    if let Some(cookie) = res.cookie(SESSION) {
        return Some(cookie.clone().into_owned());
    }
    res.headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| cookie::Cookie::parse(v.to_string()).ok())
        .find(|c| c.name() == SESSION)
}

fn session_token(res: &Response) -> Option<String> {
    session_cookie(res).map(|c| c.value().to_string())
}

#[tokio::test]
async fn test_session_survives_requests() {
    let documents = MemoryDocumentStore::new();
    let service = service(documents.clone());
    let collection = Collection::new("app", "sessions");

    let mut res = TestClient::get(URL).send(&service).await;
    assert_eq!(res.take_string().await.unwrap(), "1");
    let token = session_token(&res).expect("first response sets the session cookie");
    assert_eq!(documents.len(&collection), 1);

    let mut res = TestClient::get(URL)
        .add_header(COOKIE, format!("{}={}", SESSION, token), true)
        .send(&service)
        .await;
    assert_eq!(res.take_string().await.unwrap(), "2");
    // Same record, updated in place
    assert_eq!(documents.len(&collection), 1);
}

#[tokio::test]
async fn test_read_only_request_sets_no_cookie() {
    let service = service(MemoryDocumentStore::new());

    let mut res = TestClient::get(format!("{}peek", URL)).send(&service).await;
    assert_eq!(res.take_string().await.unwrap(), "new=true count=None");
    assert!(session_token(&res).is_none());
}

#[tokio::test]
async fn test_forged_cookie_starts_new_session() {
    let documents = MemoryDocumentStore::new();
    let service = service(documents.clone());

    let mut res = TestClient::get(URL)
        .add_header(COOKIE, format!("{}=forged-token", SESSION), true)
        .send(&service)
        .await;
    assert_eq!(res.take_string().await.unwrap(), "1");
    assert!(session_token(&res).is_some());

    let mut res = TestClient::get(format!("{}peek", URL))
        .add_header(COOKIE, format!("{}=forged-token", SESSION), true)
        .send(&service)
        .await;
    assert!(res.take_string().await.unwrap().starts_with("error: Session decode error"));
}

#[tokio::test]
async fn test_logout_expires_cookie_and_record() {
    let documents = MemoryDocumentStore::new();
    let service = service(documents.clone());
    let collection = Collection::new("app", "sessions");

    let res = TestClient::get(URL).send(&service).await;
    let token = session_token(&res).unwrap();
    assert_eq!(documents.len(&collection), 1);

    let mut res = TestClient::get(format!("{}logout", URL))
        .add_header(COOKIE, format!("{}={}", SESSION, token), true)
        .send(&service)
        .await;
    assert_eq!(res.take_string().await.unwrap(), "bye");
    let removal = session_cookie(&res).unwrap();
    assert_eq!(removal.value(), "");
    assert_eq!(removal.max_age(), Some(cookie::time::Duration::ZERO));
    assert!(documents.is_empty(&collection));

    // The old cookie no longer resumes anything
    let mut res = TestClient::get(URL)
        .add_header(COOKIE, format!("{}={}", SESSION, token), true)
        .send(&service)
        .await;
    assert_eq!(res.take_string().await.unwrap(), "1");
}
