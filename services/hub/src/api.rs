//! Channel CRUD surface.
//!
//! JSON over `/channel`: list, create, show, update, delete. Create and
//! update validate the body and hash the password before it ever reaches
//! the store. Unknown ids are 404, validation failures 400, everything
//! else 500; error bodies are `{"error": <message>}`.

use hub_channels::{hash, Channel, ChannelRepo, RepoError};
use hub_relay::SessionRegistry;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{error, info};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Create/update request body.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
}

/// The CRUD route tree.
pub fn routes(
    repo: Arc<dyn ChannelRepo>,
    registry: Arc<SessionRegistry>,
) -> impl Filter<Extract = (impl Reply + Send,), Error = Rejection> + Clone + Send + Sync + 'static
{
    let index = warp::path!("channel")
        .and(warp::get())
        .and(with_repo(Arc::clone(&repo)))
        .and_then(index);

    let store = warp::path!("channel")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_repo(Arc::clone(&repo)))
        .and_then(store);

    let show = warp::path!("channel" / String)
        .and(warp::get())
        .and(with_repo(Arc::clone(&repo)))
        .and_then(show);

    let update = warp::path!("channel" / String)
        .and(warp::put())
        .and(warp::body::json())
        .and(with_repo(Arc::clone(&repo)))
        .and_then(update);

    let delete = warp::path!("channel" / String)
        .and(warp::delete())
        .and(with_repo(repo))
        .and(with_registry(registry))
        .and_then(delete);

    index.or(store).or(show).or(update).or(delete)
}

fn with_repo(
    repo: Arc<dyn ChannelRepo>,
) -> impl Filter<Extract = (Arc<dyn ChannelRepo>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&repo))
}

fn with_registry(
    registry: Arc<SessionRegistry>,
) -> impl Filter<Extract = (Arc<SessionRegistry>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&registry))
}

async fn index(repo: Arc<dyn ChannelRepo>) -> Result<Response, Infallible> {
    match repo.all().await {
        Ok(channels) => {
            let views: Vec<_> = channels.iter().map(Channel::view).collect();
            Ok(json_reply(StatusCode::OK, &views))
        }
        Err(e) => Ok(store_error(e)),
    }
}

async fn store(body: ChannelRequest, repo: Arc<dyn ChannelRepo>) -> Result<Response, Infallible> {
    if let Err(message) = validate(&body) {
        return Ok(error_reply(StatusCode::BAD_REQUEST, message));
    }

    let secret = match hash_password(body.password).await {
        Ok(secret) => secret,
        Err(response) => return Ok(response),
    };

    match repo.insert(Channel::new(body.name, secret)).await {
        Ok(channel) => {
            info!(channel = %channel.id, name = %channel.name, "channel created");
            Ok(json_reply(StatusCode::CREATED, &channel.view()))
        }
        Err(e) => Ok(store_error(e)),
    }
}

async fn show(id: String, repo: Arc<dyn ChannelRepo>) -> Result<Response, Infallible> {
    match repo.find_id(&id).await {
        Ok(channel) => Ok(json_reply(StatusCode::OK, &channel.view())),
        Err(e) => Ok(store_error(e)),
    }
}

async fn update(
    id: String,
    body: ChannelRequest,
    repo: Arc<dyn ChannelRepo>,
) -> Result<Response, Infallible> {
    if let Err(message) = validate(&body) {
        return Ok(error_reply(StatusCode::BAD_REQUEST, message));
    }

    let secret = match hash_password(body.password).await {
        Ok(secret) => secret,
        Err(response) => return Ok(response),
    };

    match repo.update_id(&id, body.name, secret).await {
        Ok(channel) => {
            info!(channel = %channel.id, "channel updated");
            Ok(json_reply(StatusCode::OK, &channel.view()))
        }
        Err(e) => Ok(store_error(e)),
    }
}

async fn delete(
    id: String,
    repo: Arc<dyn ChannelRepo>,
    registry: Arc<SessionRegistry>,
) -> Result<Response, Infallible> {
    match repo.delete_id(&id).await {
        Ok(channel) => {
            // drop any live session along with the record
            registry.remove(&id, "channel deleted");
            info!(channel = %channel.id, "channel deleted");

            Ok(json_reply(StatusCode::OK, &channel.view()))
        }
        Err(e) => Ok(store_error(e)),
    }
}

/// `name` must be non-empty alphanumeric (any script); `password` must
/// be non-empty.
fn validate(body: &ChannelRequest) -> Result<(), &'static str> {
    if body.name.is_empty() {
        return Err("name: required");
    }
    if !body.name.chars().all(char::is_alphanumeric) {
        return Err("name: expected alphanumeric characters");
    }
    if body.password.is_empty() {
        return Err("password: required");
    }

    Ok(())
}

/// Key derivation is CPU-bound, so it runs on the blocking pool.
async fn hash_password(password: String) -> Result<String, Response> {
    match tokio::task::spawn_blocking(move || hash::hash(&password)).await {
        Ok(Ok(secret)) => Ok(secret),
        Ok(Err(e)) => {
            error!("password hashing failed: {}", e);
            Err(error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "password hashing failed",
            ))
        }
        Err(e) => {
            error!("password hashing task failed: {}", e);
            Err(error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "password hashing failed",
            ))
        }
    }
}

fn json_reply<T: Serialize>(status: StatusCode, value: &T) -> Response {
    warp::reply::with_status(warp::reply::json(value), status).into_response()
}

pub(crate) fn error_reply(status: StatusCode, message: impl Into<String>) -> Response {
    json_reply(status, &serde_json::json!({ "error": message.into() }))
}

fn store_error(e: RepoError) -> Response {
    if e.is_not_found() {
        error_reply(StatusCode::NOT_FOUND, e.to_string())
    } else {
        error!("store operation failed: {}", e);
        error_reply(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }
}
