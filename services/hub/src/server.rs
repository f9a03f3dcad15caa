//! Hub HTTP/WebSocket server.

use crate::api;
use crate::config::HubConfig;
use hub_channels::ChannelRepo;
use hub_relay::{lifecycle, ChannelDirectory, Role, SessionRegistry};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

pub struct HubServer {
    config: HubConfig,
    repo: Arc<dyn ChannelRepo>,
    registry: Arc<SessionRegistry>,
    directory: ChannelDirectory,
}

impl HubServer {
    pub fn new(config: HubConfig, repo: Arc<dyn ChannelRepo>) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let directory = ChannelDirectory::new(Arc::clone(&repo));

        Self {
            config,
            repo,
            registry,
            directory,
        }
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// The full route tree: upgrade endpoints, channel CRUD, health and
    /// status.
    pub fn routes(
        &self,
    ) -> impl Filter<Extract = (impl Reply + Send,), Error = Rejection> + Clone + Send + Sync + 'static
    {
        let subscribe = self.upgrade_route("subscribe", Role::Subscriber);
        let publish = self.upgrade_route("publish", Role::Producer);

        // an upgrade without a channel id is a plain bad request
        let subscribe_missing = warp::path!("subscribe")
            .map(|| api::error_reply(StatusCode::BAD_REQUEST, "expected channel id"));
        let publish_missing = warp::path!("publish")
            .map(|| api::error_reply(StatusCode::BAD_REQUEST, "expected channel id"));

        let channel_api = api::routes(Arc::clone(&self.repo), Arc::clone(&self.registry));

        let health =
            warp::path!("health").map(|| warp::reply::with_status("OK", StatusCode::OK));

        let repo = Arc::clone(&self.repo);
        let registry = Arc::clone(&self.registry);
        let status = warp::path!("status").and_then(move || {
            let repo = Arc::clone(&repo);
            let registry = Arc::clone(&registry);
            async move {
                let channels = repo.count().await.unwrap_or(0);
                Ok::<_, Rejection>(warp::reply::json(&serde_json::json!({
                    "status": "running",
                    "service": "telemetry-hub",
                    "version": env!("CARGO_PKG_VERSION"),
                    "channels": channels,
                    "sessions": registry.len(),
                })))
            }
        });

        subscribe
            .or(publish)
            .or(subscribe_missing)
            .or(publish_missing)
            .or(channel_api)
            .or(health)
            .or(status)
    }

    fn upgrade_route(
        &self,
        prefix: &'static str,
        role: Role,
    ) -> impl Filter<Extract = (impl Reply + Send,), Error = Rejection> + Clone + Send + Sync + 'static
    {
        let directory = self.directory.clone();
        let registry = Arc::clone(&self.registry);

        warp::path(prefix)
            .and(warp::path::param::<String>())
            .and(warp::path::end())
            .and(warp::ws())
            .map(move |id: String, ws: warp::ws::Ws| {
                // param matches a zero-length trailing segment, so a
                // request like `/subscribe/` lands here with an empty id
                if id.is_empty() {
                    return api::error_reply(StatusCode::BAD_REQUEST, "expected channel id");
                }

                let directory = directory.clone();
                let registry = Arc::clone(&registry);

                ws.on_upgrade(move |socket| {
                    lifecycle::run(role, id, socket, directory, registry)
                })
                .into_response()
            })
    }

    /// Serve until the process is stopped.
    pub async fn start(&self) -> anyhow::Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid bind address: {e}"))?;

        info!("starting telemetry hub on {}", addr);

        let routes = self.routes();
        if self.config.enable_cors {
            warp::serve(routes.with(warp::cors().allow_any_origin()))
                .run(addr)
                .await;
        } else {
            warp::serve(routes).run(addr).await;
        }

        Ok(())
    }
}
