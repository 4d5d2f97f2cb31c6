//! Basic example using the in-memory document store

use salvo::prelude::*;
use salvo_document_session::{
    MemoryDocumentStore, SessionConfig, SessionDepotExt, SessionHandler, SessionStore,
};

const SESSION: &str = "visits";

#[handler]
async fn index(depot: &mut Depot, res: &mut Response) {
    let registry = depot.sessions_mut().expect("Session handler not installed");
    let session = match registry.get_or_new(SESSION).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "Session lookup failed");
            res.status_code(StatusCode::SERVICE_UNAVAILABLE);
            return;
        }
    };

    // Get current view count
    let views: i32 = session.get("views").unwrap_or(0);

    // Increment view count
    if let Err(e) = session.set("views", views + 1) {
        tracing::error!(error = %e, "Failed to update session");
    }

    res.render(format!(
        "Hello! You have viewed this page {} time(s).\nSession ID: {}",
        views + 1,
        if session.id().is_empty() { "(assigned on save)" } else { session.id() }
    ));
}

#[handler]
async fn get_user(depot: &mut Depot) -> String {
    let registry = depot.sessions_mut().expect("Session handler not installed");

    match registry.get(SESSION).await {
        Ok(session) => match session.get::<String>("user") {
            Some(user) => format!("Logged in as: {}", user),
            None => "Not logged in".to_string(),
        },
        Err(e) => format!("No session: {}", e),
    }
}

#[handler]
async fn set_user(req: &mut Request, depot: &mut Depot) -> String {
    // Get username from query parameter
    let username = req.query::<String>("name").unwrap_or_else(|| "anonymous".to_string());

    let registry = depot.sessions_mut().expect("Session handler not installed");
    match registry.get_or_new(SESSION).await {
        Ok(session) => match session.set("user", &username) {
            Ok(()) => format!("User set to: {}", username),
            Err(e) => format!("Could not set user: {}", e),
        },
        Err(e) => format!("Session unavailable: {}", e),
    }
}

#[handler]
async fn logout(depot: &mut Depot) -> &'static str {
    let registry = depot.sessions_mut().expect("Session handler not installed");

    // Delete the record and expire the cookie
    if let Ok(session) = registry.get_or_new(SESSION).await {
        session.destroy();
    }

    "Logged out successfully"
}

#[tokio::main]
async fn main() {
    // Set up logging
    tracing_subscriber::fmt::init();

    // Configure the store
    let config = SessionConfig::new("your-super-secret-hash-key-change-in-production")
        .with_database("demo")
        .with_table("sessions")
        .with_max_age(3600); // 1 hour

    let store = SessionStore::new(MemoryDocumentStore::new(), config).expect("invalid session config");

    // Build router
    let router = Router::new()
        .hoop(SessionHandler::new(store))
        .get(index)
        .push(Router::with_path("user").get(get_user))
        .push(Router::with_path("login").get(set_user))
        .push(Router::with_path("logout").get(logout));

    // Start server
    let acceptor = TcpListener::new("127.0.0.1:5800").bind().await;
    println!("Server running at http://127.0.0.1:5800");
    println!("Try these endpoints:");
    println!("  GET /           - View counter");
    println!("  GET /user       - Get current user");
    println!("  GET /login?name=alice - Set user");
    println!("  GET /logout     - Destroy session");

    Server::new(acceptor).serve(router).await;
}
