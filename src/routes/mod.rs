/**
 * Routes Module
 * API route handlers
 */

pub mod auth;
pub mod blog;
pub mod contact;
pub mod dashboard;
pub mod extract;
pub mod health;
pub mod messages;
pub mod partners;
pub mod portfolio;
pub mod rss;
pub mod site;
pub mod upload;

pub use crate::error::{ErrorResponse, SuccessResponse};

#[cfg(test)]
pub(crate) mod test_helpers {
    use axum::{
        body::Body,
        extract::connect_info::MockConnectInfo,
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use std::net::SocketAddr;
    use tower::ServiceExt;

    use crate::state::AppState;

    pub(crate) fn app_from(state: AppState, ip: [u8; 4]) -> Router {
        crate::create_app(state).layer(MockConnectInfo(SocketAddr::from((ip, 12345))))
    }

    pub(crate) fn app(state: AppState) -> Router {
        app_from(state, [127, 0, 0, 1])
    }

    /// Send a request and decode the JSON body (`Value::Null` when empty or not JSON).
    pub(crate) async fn send(
        app: Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
        auth: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = auth {
            req = req.header("authorization", token);
        }
        let req = match body {
            Some(json) => req
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    pub(crate) async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        send(app, "GET", uri, None, None).await
    }
}
