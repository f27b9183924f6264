use std::future::Future;
use std::net::SocketAddr;

use anyhow::Result;
use axum::routing::get;
use axum::Router;

pub const HEALTH_REPLY: &str = "Bot is running";

/// Adds `GET /` next to the update route registered by teloxide.
pub fn with_health_route(router: Router) -> Router {
    router.route("/", get(|| async { HEALTH_REPLY }))
}

/// Serves `app` on `address` until `stop` resolves.
pub async fn serve(
    app: Router,
    address: SocketAddr,
    stop: impl Future<Output = ()>,
) -> Result<()> {
    axum::Server::try_bind(&address)?
        .serve(app.into_make_service())
        .with_graceful_shutdown(stop)
        .await?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn spawn_test_server(app: Router) -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind to port 0");
    let addr = listener.local_addr().expect("get local addr");
    let server = axum::Server::from_tcp(listener)
        .expect("use listener")
        .serve(app.into_make_service());
    tokio::spawn(async move {
        server.await.ok();
    });
    addr
}
