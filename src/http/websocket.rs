//! WebSocket proxying: upstream dial, downstream upgrade, relay pair.
//!
//! # Relay Topology
//! ```text
//!   user ──frames──▶ relay_user_to_server ──binary──▶ backend
//!   user ◀──text──── relay_server_to_user ◀─frames── backend
//! ```
//!
//! Each session runs the two legs as independent tasks. Whichever leg sees
//! a close (or an error) sends a best-effort normal-closure to the peer it
//! writes to and exits; the surviving leg observes that closure on its next
//! read and exits likewise, so both sides drain without deadlock.
//!
//! Frame types are asymmetric: upstream traffic reaches the user as text
//! frames, user traffic reaches the backend as binary frames.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::FromRequestParts;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message as TgMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::http::response::json_error;
use crate::http::server::WsClass;
use crate::load_balancer::backend::WsBackend;
use crate::observability::metrics;

/// Close reason sent towards the user when the upstream leg ends.
const UPSTREAM_CLOSED: &str = "internal server error";
/// Close reason sent towards the backend when the user leg ends.
const USER_CLOSED: &str = "user closed websocket connection";

type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handle one upgrade request end to end.
///
/// Routes to a healthy backend, dials it, and only then upgrades the
/// downstream connection; a failed dial is answered 500 while the response
/// can still carry a body.
pub async fn handle_upgrade(class: Arc<WsClass>, request: Request<Body>) -> Response {
    let (user_leg, server_leg) = class.connection_ids.next_pair();

    let Some(backend) = class.pool.select(server_leg).await else {
        tracing::warn!(server_leg, "no healthy websocket backends");
        return json_error(StatusCode::SERVICE_UNAVAILABLE, "no healthy backends");
    };

    tracing::info!(
        backend_id = backend.id,
        user_leg,
        server_leg,
        "routing websocket connection"
    );

    let (mut parts, _body) = request.into_parts();
    let path = parts.uri.path().to_string();

    // Forwarding headers carry only the Auth header of the original request.
    let upstream_url = match Url::parse(&format!("ws://{}{}", backend.addr, path)) {
        Ok(url) => url,
        Err(error) => {
            tracing::error!(backend_id = backend.id, %error, "invalid upstream url");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error");
        }
    };
    let mut upstream_request = match upstream_url.as_str().into_client_request() {
        Ok(request) => request,
        Err(error) => {
            tracing::error!(backend_id = backend.id, %error, "failed to build upstream request");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error");
        }
    };
    if let Some(auth) = parts.headers.get("Auth") {
        upstream_request
            .headers_mut()
            .insert("Auth", auth.clone());
    }

    let mut upstream = match connect_async(upstream_request).await {
        Ok((upstream, _response)) => upstream,
        Err(error) => {
            tracing::error!(
                backend_id = backend.id,
                addr = %backend.addr,
                %error,
                "failed to establish upstream websocket connection"
            );
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error");
        }
    };

    // The downstream upgrade can still fail after the dial (bad or missing
    // Sec-WebSocket-* headers); the dialed backend connection must not be
    // left to linger.
    let ws = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::error!(
                backend_id = backend.id,
                error = %rejection,
                "failed to upgrade user websocket connection"
            );
            let _ = upstream.close(None).await;
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error");
        }
    };

    ws.on_upgrade(move |user| relay(user, upstream, backend))
}

/// Run both relay legs to completion.
async fn relay(user: WebSocket, upstream: UpstreamSocket, backend: Arc<WsBackend>) {
    metrics::record_websocket_session(backend.id, 1);

    let (user_sink, user_stream) = user.split();
    let (server_sink, server_stream) = upstream.split();

    let downstream_leg = tokio::spawn(relay_server_to_user(server_stream, user_sink));
    let upstream_leg = tokio::spawn(relay_user_to_server(user_stream, server_sink));

    let _ = downstream_leg.await;
    let _ = upstream_leg.await;

    metrics::record_websocket_session(backend.id, -1);
    tracing::info!(backend_id = backend.id, "websocket session closed");
}

/// Relay leg: backend → user, payloads forwarded as text frames.
async fn relay_server_to_user(
    mut server_stream: SplitStream<UpstreamSocket>,
    mut user_sink: SplitSink<WebSocket, Message>,
) {
    while let Some(frame) = server_stream.next().await {
        let message = match frame {
            Ok(TgMessage::Text(text)) => Message::Text(text.as_str().into()),
            Ok(TgMessage::Binary(payload)) => match std::str::from_utf8(&payload) {
                Ok(text) => Message::Text(text.into()),
                // Non-UTF-8 payloads cannot ride a text frame; pass them
                // through unchanged rather than corrupting them.
                Err(_) => Message::Binary(payload.into()),
            },
            Ok(TgMessage::Ping(payload)) => Message::Ping(payload.into()),
            Ok(TgMessage::Pong(payload)) => Message::Pong(payload.into()),
            Ok(TgMessage::Close(frame)) => {
                if let Some(frame) = &frame {
                    tracing::info!(
                        code = u16::from(frame.code),
                        reason = %frame.reason,
                        "received close from backend"
                    );
                }
                close_user(&mut user_sink, UPSTREAM_CLOSED).await;
                break;
            }
            Ok(TgMessage::Frame(_)) => continue,
            Err(error) => {
                tracing::warn!(%error, "error reading from backend websocket");
                close_user(&mut user_sink, UPSTREAM_CLOSED).await;
                break;
            }
        };

        if let Err(error) = user_sink.send(message).await {
            tracing::debug!(%error, "user websocket went away mid-relay");
            break;
        }
    }
}

/// Relay leg: user → backend, payloads forwarded as binary frames.
async fn relay_user_to_server(
    mut user_stream: SplitStream<WebSocket>,
    mut server_sink: SplitSink<UpstreamSocket, TgMessage>,
) {
    while let Some(frame) = user_stream.next().await {
        let message = match frame {
            Ok(Message::Text(text)) => TgMessage::Binary(text.to_string().into_bytes().into()),
            Ok(Message::Binary(payload)) => TgMessage::Binary(payload.into()),
            Ok(Message::Ping(payload)) => TgMessage::Ping(payload.into()),
            Ok(Message::Pong(payload)) => TgMessage::Pong(payload.into()),
            Ok(Message::Close(frame)) => {
                if let Some(frame) = &frame {
                    tracing::info!(
                        code = frame.code,
                        reason = %frame.reason,
                        "received close from user"
                    );
                }
                close_server(&mut server_sink, USER_CLOSED).await;
                break;
            }
            Err(error) => {
                tracing::warn!(%error, "error reading from user websocket");
                close_server(&mut server_sink, USER_CLOSED).await;
                break;
            }
        };

        if let Err(error) = server_sink.send(message).await {
            tracing::debug!(%error, "backend websocket went away mid-relay");
            break;
        }
    }
}

/// Best-effort normal closure towards the user.
async fn close_user(sink: &mut SplitSink<WebSocket, Message>, reason: &'static str) {
    let frame = CloseFrame {
        code: axum::extract::ws::close_code::NORMAL,
        reason: reason.into(),
    };
    let _ = sink.send(Message::Close(Some(frame))).await;
}

/// Best-effort normal closure towards the backend.
async fn close_server(sink: &mut SplitSink<UpstreamSocket, TgMessage>, reason: &'static str) {
    let frame = tungstenite::protocol::CloseFrame {
        code: CloseCode::Normal,
        reason: reason.into(),
    };
    let _ = sink.send(TgMessage::Close(Some(frame))).await;
}
