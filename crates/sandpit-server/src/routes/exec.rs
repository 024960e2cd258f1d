//! `POST /exec`: run a script and stream what it prints.
//!
//! | Outcome | Status | Body |
//! |---------|--------|------|
//! | printed output | 200 | output, streamed as produced |
//! | no output | 200 | `(no output)` |
//! | script error, nothing printed | 400 | sanitized error |
//! | script error after output | 200 | output followed by sanitized error |
//! | staging failure | 500 | error |

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use sandpit_script::{ChannelSink, ModuleLoader, OutputSink, run, sanitize, stage_in};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Body returned when a script succeeds without printing.
pub const NO_OUTPUT: &str = "(no output)";

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Run the request body as a script.
pub async fn exec_handler(State(state): State<AppState>, body: Bytes) -> Result<Response> {
    let staged = stage_in(&state.config.staging_dir, &body)?;
    debug!(path = %staged.path().display(), bytes = body.len(), "Staged script");

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let (done_tx, done_rx) = oneshot::channel::<Option<String>>();
    let interpreter = state.interpreter.clone();

    tokio::task::spawn_blocking(move || {
        let sink = Arc::new(ChannelSink::new(tx));
        let outcome = run(&interpreter, staged.path(), sink.clone(), ModuleLoader::None);

        let error = outcome
            .error
            .map(|e| sanitize(&e.to_string(), staged.path()));
        if outcome.wrote_output
            && let Some(message) = &error
        {
            sink.write(message);
        }

        // Released before the channel closes, so the file is gone by the
        // time the response body ends.
        staged.release();
        let _ = done_tx.send(error);
        drop(sink);
    });

    // The channel closes when the script finishes; a chunk before that
    // means output has started and the response commits to 200.
    match rx.recv().await {
        Some(first) => {
            let stream = async_stream::stream! {
                yield Ok::<_, Infallible>(Bytes::from(first));
                while let Some(chunk) = rx.recv().await {
                    yield Ok(Bytes::from(chunk));
                }
            };
            Ok((
                StatusCode::OK,
                [(header::CONTENT_TYPE, TEXT_PLAIN)],
                Body::from_stream(stream),
            )
                .into_response())
        }
        None => match done_rx.await {
            Ok(None) => Ok((StatusCode::OK, [(header::CONTENT_TYPE, TEXT_PLAIN)], NO_OUTPUT)
                .into_response()),
            Ok(Some(message)) => Err(ServerError::Script(message)),
            Err(_) => Err(ServerError::Internal("script worker exited unexpectedly".into())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::{Router, http::Request, routing::post};
    use sandpit_script::{Capabilities, Interpreter};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app_with(caps: Capabilities) -> Router {
        app_in(caps, ServerConfig::new())
    }

    fn app_in(caps: Capabilities, config: ServerConfig) -> Router {
        let state = AppState::new(Interpreter::new(caps), config);
        Router::new()
            .route("/exec", post(exec_handler))
            .with_state(state)
    }

    async fn exec(app: Router, script: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/exec")
                    .body(Body::from(script.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_empty_script() {
        let (status, body) = exec(app_with(Capabilities::default()), "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, NO_OUTPUT);
    }

    #[tokio::test]
    async fn test_print() {
        let (status, body) = exec(app_with(Capabilities::default()), "print(\"hi\");").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "hi");
    }

    #[tokio::test]
    async fn test_prints_are_concatenated() {
        let (status, body) = exec(
            app_with(Capabilities::default()),
            "for x in [\"a\", \"b\", \"c\"] { print(x); }",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "abc");
    }

    #[tokio::test]
    async fn test_syntax_error_is_sanitized() {
        let (status, body) = exec(
            app_with(Capabilities::default()),
            "let a = 1;\nlet b = 2;\nlet c = ;\n",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.starts_with("line:3"), "{body}");
        assert!(!body.contains(&std::env::temp_dir().display().to_string()));
    }

    #[tokio::test]
    async fn test_error_after_output_is_appended() {
        let (status, body) = exec(
            app_with(Capabilities::default()),
            "print(\"partial\");\nthrow \"boom\";",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("partial"));
        assert!(body.contains("line:2"));
        assert!(body.contains("boom"));
    }

    #[tokio::test]
    async fn test_disabled_feature_is_bad_request() {
        let (status, _) = exec(
            app_with(Capabilities::default().with_looping(false)),
            "while true { }",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_import_is_rejected() {
        let (status, _) = exec(
            app_with(Capabilities::default()),
            "import \"json\" as json;",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_runaway_script_times_out() {
        let caps = Capabilities::default()
            .with_max_operations(0)
            .with_timeout(Duration::from_millis(100));
        let (status, body) = exec(app_with(caps), "let x = 0; loop { x += 1; }").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("time limit"));
    }

    #[tokio::test]
    async fn test_staged_file_is_gone_when_response_ends() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(
            Capabilities::default(),
            ServerConfig::new().with_staging_dir(dir.path()),
        );
        let scripts = [
            "print(\"hi\");",
            "",
            "let c = ;",
            "print(\"partial\");\nthrow \"boom\";",
        ];

        for _ in 0..25 {
            for script in scripts {
                let _ = exec(app.clone(), script).await;
                let left = std::fs::read_dir(dir.path()).unwrap().count();
                assert_eq!(left, 0, "staged file outlived response to {script:?}");
            }
        }
    }
}
