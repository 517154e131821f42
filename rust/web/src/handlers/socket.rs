//! Websocket transport: one task per connection.
//!
//! Text frames are decoded into [`ClientEvent`]s and forwarded to the
//! coordinator. Events queued for the connection on the hub are written back
//! as JSON text frames.

use crate::coordinator::CoordinatorHandle;
use crate::errors::IntoClientError;
use crate::events::{ClientEvent, ConnectionHub, ServerEvent};
use futures::{SinkExt, StreamExt};
use warp::ws::{Message, WebSocket};

pub async fn serve_connection(socket: WebSocket, hub: ConnectionHub, coordinator: CoordinatorHandle) {
    let mut subscription = hub.connect();
    let connection_id = subscription.connection_id().clone();
    let (mut outgoing, mut incoming) = socket.split();

    loop {
        tokio::select! {
            queued = subscription.receiver.recv() => {
                let Some(event) = queued else {
                    tracing::debug!(connection_id = %connection_id, "outbound queue closed");
                    break;
                };
                if let Err(err) = outgoing.send(Message::text(event.to_json())).await {
                    tracing::warn!(
                        connection_id = %connection_id,
                        error = %err,
                        "failed to write frame"
                    );
                    break;
                }
            }
            frame = incoming.next() => {
                match frame {
                    Some(Ok(message)) if message.is_close() => break,
                    Some(Ok(message)) => {
                        let Ok(text) = message.to_str() else {
                            tracing::debug!(connection_id = %connection_id, "ignored non-text frame");
                            continue;
                        };
                        dispatch_frame(&connection_id, text, &hub, &coordinator);
                    }
                    Some(Err(err)) => {
                        tracing::debug!(connection_id = %connection_id, error = %err, "socket error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    if let Err(err) = coordinator.disconnect(connection_id.clone()) {
        err.log_for(&connection_id);
    }
    let _ = outgoing.close().await;
    drop(subscription);
    tracing::info!(connection_id = %connection_id, "client disconnected");
}

/// Decodes one text frame and hands it to the coordinator.
///
/// Decode failures are answered directly; unknown event names are dropped.
pub fn dispatch_frame(
    connection_id: &str,
    text: &str,
    hub: &ConnectionHub,
    coordinator: &CoordinatorHandle,
) {
    match ClientEvent::parse(text) {
        Ok(Some(event)) => {
            if let Err(err) = coordinator.submit(connection_id, event) {
                reject(connection_id, hub, &err);
            }
        }
        Ok(None) => {
            tracing::debug!(connection_id = %connection_id, "ignored unknown event");
        }
        Err(err) => reject(connection_id, hub, &err),
    }
}

fn reject<E: IntoClientError>(connection_id: &str, hub: &ConnectionHub, err: &E) {
    err.log_for(connection_id);
    hub.send(connection_id, ServerEvent::error(err.client_message()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::SessionCoordinator;
    use crate::settings::AppSettings;

    #[tokio::test]
    async fn decode_failures_are_answered_and_unknown_events_dropped() {
        let hub = ConnectionHub::new(8);
        let (coordinator, _task) = SessionCoordinator::spawn(hub.clone(), AppSettings::default());
        let mut sub = hub.register("c1");

        dispatch_frame("c1", "not json", &hub, &coordinator);
        dispatch_frame(
            "c1",
            r#"{"event":"makeMove","data":{"roomId":"abc"}}"#,
            &hub,
            &coordinator,
        );
        dispatch_frame("c1", r#"{"event":"wave"}"#, &hub, &coordinator);

        assert_eq!(
            sub.receiver.recv().await,
            Some(ServerEvent::error("Malformed message"))
        );
        assert_eq!(
            sub.receiver.recv().await,
            Some(ServerEvent::error("Missing or invalid fields for makeMove"))
        );
        assert!(sub.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn decoded_events_reach_the_coordinator() {
        let hub = ConnectionHub::new(8);
        let (coordinator, _task) = SessionCoordinator::spawn(hub.clone(), AppSettings::default());
        let mut sub = hub.register("c1");

        dispatch_frame(
            "c1",
            r#"{"event":"joinPlayer","data":{"name":"Alice"}}"#,
            &hub,
            &coordinator,
        );

        assert_eq!(
            sub.receiver.recv().await,
            Some(ServerEvent::Registered {
                name: "Alice".into()
            })
        );
    }
}
