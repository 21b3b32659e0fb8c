use axum::{
    Router, middleware,
    routing::{IntoMakeService, get},
};
use tower_http::cors::{Any, CorsLayer};

use crate::{DeploymentImpl, middleware as app_middleware};

pub mod activity;
pub mod confirmation;
pub mod deliberation;
pub mod health;
pub mod notifications;
pub mod proposals;
pub mod publication;
pub mod reviews;

/// Every route under `/api`, with request ids and CORS applied.
pub fn api_router(deployment: DeploymentImpl) -> Router {
    let base_routes = Router::new()
        .route("/health", get(health::health_check))
        .merge(proposals::router())
        .merge(reviews::router())
        .merge(deliberation::router())
        .merge(publication::router())
        .merge(confirmation::router())
        .merge(activity::router())
        .merge(notifications::router())
        .with_state(deployment);

    Router::new()
        .nest("/api", base_routes)
        .layer(middleware::from_fn(app_middleware::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

pub fn router(deployment: DeploymentImpl) -> IntoMakeService<Router> {
    api_router(deployment).into_make_service()
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use db::{
        DBService,
        models::{
            proposal::Proposal,
            test_utils::{create_test_event, create_test_proposal, setup_test_pool},
        },
    };
    use serde_json::{Value, json};
    use services::services::config::Config;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::middleware::{PRINCIPAL_ID_HEADER, PRINCIPAL_ROLE_HEADER, REQUEST_ID_HEADER};

    struct TestApp {
        app: Router,
        event_id: Uuid,
        proposal: Proposal,
    }

    async fn test_app() -> TestApp {
        let pool = setup_test_pool().await;
        let event = create_test_event(&pool).await;
        let proposal = create_test_proposal(&pool, event.id, &["ada"]).await;
        let deployment = DeploymentImpl::from_parts(DBService::from_pool(pool), Config::default());
        TestApp {
            app: api_router(deployment),
            event_id: event.id,
            proposal,
        }
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        caller: Option<(&str, &str)>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((id, role)) = caller {
            builder = builder
                .header(PRINCIPAL_ID_HEADER, id)
                .header(PRINCIPAL_ROLE_HEADER, role);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    const ORGANIZER: Option<(&str, &str)> = Some(("org", "organizer"));
    const REVIEWER: Option<(&str, &str)> = Some(("rev", "reviewer"));
    const SPEAKER: Option<(&str, &str)> = Some(("ada", "speaker"));

    #[tokio::test]
    async fn health_carries_a_request_id() {
        let TestApp { app, .. } = test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn anonymous_calls_are_unauthorized() {
        let TestApp { app, proposal, .. } = test_app().await;
        let (status, body) = call(
            &app,
            "GET",
            &format!("/api/proposals/{}/aggregate", proposal.id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn reviews_feed_the_aggregate() {
        let TestApp { app, proposal, .. } = test_app().await;
        let reviews = format!("/api/proposals/{}/reviews", proposal.id);

        let (status, _) = call(
            &app,
            "POST",
            &reviews,
            REVIEWER,
            Some(json!({ "note": 4, "feeling": "positive" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &app,
            "POST",
            &reviews,
            ORGANIZER,
            Some(json!({ "note": 9, "feeling": "neutral" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_data"]["kind"], json!("invalid_input"));

        let (status, _) = call(
            &app,
            "POST",
            &reviews,
            SPEAKER,
            Some(json!({ "note": 5, "feeling": "positive" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(
            &app,
            "GET",
            &format!("/api/proposals/{}/aggregate", proposal.id),
            ORGANIZER,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["average_note"], json!(4.0));
        assert_eq!(body["data"]["reviewer_count"], json!(1));
    }

    #[tokio::test]
    async fn re_deciding_a_published_proposal_needs_confirmation() {
        let TestApp {
            app,
            event_id,
            proposal,
        } = test_app().await;
        let status_uri = format!("/api/proposals/{}/status", proposal.id);

        let (status, _) = call(
            &app,
            "POST",
            &status_uri,
            ORGANIZER,
            Some(json!({ "status": "accepted" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/events/{event_id}/publish"),
            ORGANIZER,
            Some(json!({ "decision": "accepted" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["published_count"], json!(1));

        let (status, body) = call(
            &app,
            "POST",
            &status_uri,
            ORGANIZER,
            Some(json!({ "status": "rejected" })),
        )
        .await;
        assert_eq!(status, StatusCode::PRECONDITION_REQUIRED);
        assert_eq!(body["error_data"]["kind"], json!("requires_confirmation"));

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/proposals/{}/confirm", proposal.id),
            SPEAKER,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["confirmation_status"], json!("confirmed"));

        let (status, body) = call(
            &app,
            "GET",
            &format!("/api/proposals/{}/timeline", proposal.id),
            SPEAKER,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn speakers_cannot_see_other_proposals() {
        let TestApp { app, proposal, .. } = test_app().await;
        let uri = format!("/api/proposals/{}", proposal.id);

        let (status, _) = call(&app, "GET", &uri, SPEAKER, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, "GET", &uri, Some(("eve", "speaker")), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_data"]["kind"], json!("not_found"));
    }

    #[tokio::test]
    async fn timeline_pages_resume_after_the_last_seq() {
        let TestApp { app, proposal, .. } = test_app().await;
        let comments = format!("/api/proposals/{}/comments", proposal.id);
        for text in ["first", "second", "third"] {
            let (status, _) =
                call(&app, "POST", &comments, ORGANIZER, Some(json!({ "text": text }))).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let timeline = format!("/api/proposals/{}/timeline", proposal.id);
        let (status, body) =
            call(&app, "GET", &format!("{timeline}?limit=2"), ORGANIZER, None).await;
        assert_eq!(status, StatusCode::OK);
        let page = body["data"].as_array().cloned().unwrap_or_default();
        assert_eq!(page.len(), 2);

        let last_seq = page[1]["seq"].as_i64().unwrap();
        let (_, body) = call(
            &app,
            "GET",
            &format!("{timeline}?after_seq={last_seq}"),
            ORGANIZER,
            None,
        )
        .await;
        let rest = body["data"].as_array().cloned().unwrap_or_default();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0]["kind"]["text"], json!("third"));
    }

    #[tokio::test]
    async fn delivery_queue_is_organizer_only() {
        let TestApp { app, .. } = test_app().await;
        let (status, _) = call(&app, "GET", "/api/notifications/pending", REVIEWER, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) =
            call(&app, "GET", "/api/notifications/pending?limit=10", ORGANIZER, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([]));
    }
}
