use std::convert::Infallible;
use std::sync::Arc;

use warp::http::StatusCode;
use warp::{Filter, Reply};

use super::websocket;
use crate::classroom::{ClassroomHandle, ResourceNotice, SlideProgress, SlideSetProduced};
use crate::config::ClassroomConfig;
use crate::directory::UserDirectory;
use crate::error::ClassroomError;

const MAX_BODY_BYTES: u64 = 4 * 1024 * 1024;

/// Every classroom endpoint, WebSocket and HTTP.
pub fn routes(
    classroom: ClassroomHandle,
    directory: Arc<dyn UserDirectory>,
    config: ClassroomConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    classroom_websocket_route(classroom.clone(), directory)
        .or(classroom_health_check())
        .or(classroom_config_endpoint(config))
        .or(classroom_state_endpoint(classroom.clone()))
        .or(slide_progress_endpoint(classroom.clone()))
        .or(slide_set_endpoint(classroom.clone()))
        .or(resource_notice_endpoint(classroom))
}

pub fn classroom_websocket_route(
    classroom: ClassroomHandle,
    directory: Arc<dyn UserDirectory>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("classroom")
        .and(warp::path::end())
        .and(warp::ws())
        .and(with_classroom(classroom))
        .and(with_directory(directory))
        .map(
            |ws: warp::ws::Ws, classroom: ClassroomHandle, directory: Arc<dyn UserDirectory>| {
                ws.on_upgrade(move |websocket| {
                    websocket::handle_classroom_websocket(websocket, classroom, directory)
                })
            },
        )
}

pub fn classroom_health_check(
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("classroom" / "health")
        .and(warp::get())
        .map(|| {
            warp::reply::json(&serde_json::json!({
                "status": "healthy",
                "service": "Classroom Server",
                "version": env!("CARGO_PKG_VERSION")
            }))
        })
}

pub fn classroom_config_endpoint(
    config: ClassroomConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("classroom" / "config")
        .and(warp::get())
        .map(move || {
            warp::reply::json(&serde_json::json!({
                "stunServerUrl": config.stun_server_url,
                "maxMessageLength": config.max_message_length
            }))
        })
}

pub fn classroom_state_endpoint(
    classroom: ClassroomHandle,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("classroom" / "state")
        .and(warp::get())
        .and(with_classroom(classroom))
        .and_then(current_state)
}

/// Slide producer hand-off of a finished deck.
pub fn slide_set_endpoint(
    classroom: ClassroomHandle,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("classroom" / "slides")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_classroom(classroom))
        .and_then(apply_slide_set)
}

pub fn slide_progress_endpoint(
    classroom: ClassroomHandle,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("classroom" / "slides" / "progress")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_classroom(classroom))
        .and_then(relay_slide_progress)
}

pub fn resource_notice_endpoint(
    classroom: ClassroomHandle,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("classroom" / "resources")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_classroom(classroom))
        .and_then(relay_resource_notice)
}

async fn current_state(classroom: ClassroomHandle) -> Result<warp::reply::Response, Infallible> {
    Ok(match classroom.snapshot().await {
        Ok(state) => warp::reply::json(&state).into_response(),
        Err(e) => error_reply(&e),
    })
}

async fn apply_slide_set(
    produced: SlideSetProduced,
    classroom: ClassroomHandle,
) -> Result<warp::reply::Response, Infallible> {
    Ok(match classroom.apply_slide_set(produced).await {
        Ok(total_slides) => {
            warp::reply::json(&serde_json::json!({ "totalSlides": total_slides })).into_response()
        }
        Err(e) => error_reply(&e),
    })
}

async fn relay_slide_progress(
    progress: SlideProgress,
    classroom: ClassroomHandle,
) -> Result<warp::reply::Response, Infallible> {
    Ok(match classroom.slide_progress(progress) {
        Ok(()) => accepted(),
        Err(e) => error_reply(&e),
    })
}

async fn relay_resource_notice(
    notice: ResourceNotice,
    classroom: ClassroomHandle,
) -> Result<warp::reply::Response, Infallible> {
    Ok(match classroom.resource_notice(notice) {
        Ok(()) => accepted(),
        Err(e) => error_reply(&e),
    })
}

fn accepted() -> warp::reply::Response {
    warp::reply::with_status(
        warp::reply::json(&serde_json::json!({ "status": "accepted" })),
        StatusCode::ACCEPTED,
    )
    .into_response()
}

fn error_reply(error: &ClassroomError) -> warp::reply::Response {
    let status = match error {
        ClassroomError::EmptySlideSet => StatusCode::UNPROCESSABLE_ENTITY,
        ClassroomError::Internal(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_REQUEST,
    };
    tracing::warn!(error = %error, status = %status, "Request rejected");

    warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "code": error.code(),
            "message": error.to_string()
        })),
        status,
    )
    .into_response()
}

fn with_classroom(
    classroom: ClassroomHandle,
) -> impl Filter<Extract = (ClassroomHandle,), Error = Infallible> + Clone {
    warp::any().map(move || classroom.clone())
}

fn with_directory(
    directory: Arc<dyn UserDirectory>,
) -> impl Filter<Extract = (Arc<dyn UserDirectory>,), Error = Infallible> + Clone {
    warp::any().map(move || directory.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classroom::CommandProcessor;
    use crate::directory::OpenUserDirectory;
    use serde_json::{json, Value};

    fn test_routes() -> (
        ClassroomHandle,
        impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone,
    ) {
        let classroom = ClassroomHandle::spawn(CommandProcessor::default());
        let routes = routes(
            classroom.clone(),
            Arc::new(OpenUserDirectory),
            ClassroomConfig::default(),
        );
        (classroom, routes)
    }

    async fn recv_json(client: &mut warp::test::WsClient) -> Value {
        let message = client.recv().await.expect("websocket closed");
        serde_json::from_str(message.to_str().expect("text frame")).unwrap()
    }

    async fn recv_type(client: &mut warp::test::WsClient, kind: &str) -> Value {
        loop {
            let value = recv_json(client).await;
            if value["type"] == kind {
                return value;
            }
        }
    }

    async fn join(client: &mut warp::test::WsClient, username: &str, role: &str) -> Value {
        client
            .send_text(json!({"type": "join", "username": username, "role": role}).to_string())
            .await;
        let joined = recv_type(client, "classroom-joined").await;
        recv_type(client, "participants-updated").await;
        joined
    }

    fn slide_set(count: usize) -> Value {
        json!({
            "classroomId": "room-1",
            "slides": (0..count)
                .map(|i| json!({"url": format!("/slides/d/slide-{}.webp", i + 1), "name": format!("slide-{}.webp", i + 1)}))
                .collect::<Vec<_>>()
        })
    }

    #[tokio::test]
    async fn test_health_check() {
        let (_, routes) = test_routes();
        let resp = warp::test::request()
            .method("GET")
            .path("/classroom/health")
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), 200);
        let body: Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "Classroom Server");
    }

    #[tokio::test]
    async fn test_config_endpoint() {
        let (_, routes) = test_routes();
        let resp = warp::test::request()
            .method("GET")
            .path("/classroom/config")
            .reply(&routes)
            .await;

        let body: Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["maxMessageLength"], 500);
        assert!(body["stunServerUrl"].as_str().unwrap().starts_with("stun:"));
    }

    #[tokio::test]
    async fn test_state_endpoint_starts_empty() {
        let (_, routes) = test_routes();
        let resp = warp::test::request()
            .method("GET")
            .path("/classroom/state")
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), 200);
        let body: Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["totalSlides"], 0);
        assert_eq!(body["isTeacherPresent"], false);
        assert_eq!(body["whiteboardMode"], "off");
    }

    #[tokio::test]
    async fn test_empty_slide_set_rejected() {
        let (_, routes) = test_routes();
        let resp = warp::test::request()
            .method("POST")
            .path("/classroom/slides")
            .json(&slide_set(0))
            .reply(&routes)
            .await;

        assert_eq!(resp.status(), 422);
        let body: Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["code"], "empty-slide-set");
    }

    #[tokio::test]
    async fn test_slide_set_applied_and_broadcast() {
        let (classroom, routes) = test_routes();
        let mut student = warp::test::ws()
            .path("/classroom")
            .handshake(routes.clone())
            .await
            .expect("handshake");
        join(&mut student, "ana", "student").await;

        let resp = warp::test::request()
            .method("POST")
            .path("/classroom/slides")
            .json(&slide_set(3))
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 200);
        let body: Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["totalSlides"], 3);

        let complete = recv_json(&mut student).await;
        assert_eq!(complete["type"], "upload-complete");
        assert_eq!(complete["totalSlides"], 3);
        let state = recv_json(&mut student).await;
        assert_eq!(state["type"], "classroom-state");
        assert_eq!(state["state"]["slideSet"][2]["index"], 2);

        let snapshot = classroom.snapshot().await.unwrap();
        assert_eq!(snapshot.current_slide_index, 0);
        assert_eq!(snapshot.total_slides, 3);
    }

    #[tokio::test]
    async fn test_progress_and_resources_relayed() {
        let (_, routes) = test_routes();
        let mut student = warp::test::ws()
            .path("/classroom")
            .handshake(routes.clone())
            .await
            .expect("handshake");
        join(&mut student, "ana", "student").await;

        let resp = warp::test::request()
            .method("POST")
            .path("/classroom/slides/progress")
            .json(&json!({"type": "total-slides", "classroomId": "room-1", "totalSlides": 4}))
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 202);
        let progress = recv_json(&mut student).await;
        assert_eq!(progress["type"], "total-slides");
        assert_eq!(progress["totalSlides"], 4);

        let resp = warp::test::request()
            .method("POST")
            .path("/classroom/resources")
            .json(&json!({"type": "resource-added", "resource": {"name": "notes.pdf"}}))
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 202);
        let added = recv_json(&mut student).await;
        assert_eq!(added["type"], "resource-added");
        assert_eq!(added["resource"]["name"], "notes.pdf");
    }

    #[tokio::test]
    async fn test_student_slide_change_rejected_privately() {
        let (classroom, routes) = test_routes();
        let mut teacher = warp::test::ws()
            .path("/classroom")
            .handshake(routes.clone())
            .await
            .expect("handshake");
        join(&mut teacher, "mlee", "teacher").await;
        let mut student = warp::test::ws()
            .path("/classroom")
            .handshake(routes.clone())
            .await
            .expect("handshake");
        join(&mut student, "ana", "student").await;
        recv_type(&mut teacher, "participants-updated").await;

        student
            .send_text(json!({"type": "change-slide", "index": 1}).to_string())
            .await;
        let rejected = recv_json(&mut student).await;
        assert_eq!(rejected["type"], "command-rejected");
        assert_eq!(rejected["command"], "change-slide");
        assert_eq!(rejected["code"], "unauthorized");

        // teacher's next frame is its own chat, not the rejection
        teacher
            .send_text(json!({"type": "send-message", "text": "hello"}).to_string())
            .await;
        let next = recv_json(&mut teacher).await;
        assert_eq!(next["type"], "new-message");
        assert_eq!(classroom.snapshot().await.unwrap().current_slide_index, 0);
    }

    #[tokio::test]
    async fn test_malformed_frame_rejected() {
        let (_, routes) = test_routes();
        let mut client = warp::test::ws()
            .path("/classroom")
            .handshake(routes)
            .await
            .expect("handshake");

        client
            .send_text(json!({"type": "change-slide", "index": "two"}).to_string())
            .await;
        let rejected = recv_json(&mut client).await;
        assert_eq!(rejected["type"], "command-rejected");
        assert_eq!(rejected["command"], "change-slide");
        assert_eq!(rejected["code"], "invalid-message");

        client.send_text("not json").await;
        let rejected = recv_json(&mut client).await;
        assert_eq!(rejected["code"], "invalid-message");
    }

    #[tokio::test]
    async fn test_command_before_join_rejected() {
        let (_, routes) = test_routes();
        let mut client = warp::test::ws()
            .path("/classroom")
            .handshake(routes)
            .await
            .expect("handshake");

        client
            .send_text(json!({"type": "send-message", "text": "hi"}).to_string())
            .await;
        let rejected = recv_json(&mut client).await;
        assert_eq!(rejected["code"], "not-joined");
    }
}
