use std::convert::Infallible;
use std::sync::Arc;

use serde_json::json;
use warp::hyper::body::Bytes;
use warp::{reply, Filter, Rejection, Reply};

use crate::admission::Injector;

pub fn routes(injector: Arc<Injector>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let mutate = warp::post()
        .and(warp::path("mutate"))
        .and(warp::path::end())
        .and(warp::body::bytes())
        .and(warp::any().map(move || injector.clone()))
        .and_then(mutate_handler);

    let health = warp::get()
        .and(warp::path("healthz"))
        .and(warp::path::end())
        .map(|| reply::json(&json!({"message": "ok"})));

    mutate.or(health).with(warp::trace::request())
}

// Failures are carried inside the AdmissionReview, never as an HTTP error
async fn mutate_handler(body: Bytes, injector: Arc<Injector>) -> Result<impl Reply, Infallible> {
    let review = injector.handle(&body).await;
    Ok(reply::json(&review))
}
