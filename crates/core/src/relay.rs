//! Best-effort UDP relay to the visualisation consumer.
//!
//! Every accepted contribution is sent as one JSON datagram to a destination fixed at startup.
//! Sends are fire-and-forget: there are no acknowledgements, retries or sequence numbers, and a
//! lost or reordered datagram is not an error. A failed send is reported to the caller, who
//! decides what it means; it never touches the story store.

use crate::constants::{RELAY_DEBUG_PING_TYPE, RELAY_PING_MESSAGE, RELAY_STORY_WORD_TYPE};
use crate::store::StoryDocument;
use crate::validation::Contribution;
use crate::{StoryError, StoryResult};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;

/// Wire format of a relay datagram.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayMessage<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_story: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub timestamp: String,
}

/// Sends relay notifications over a shared UDP socket.
#[derive(Debug)]
pub struct EventRelay {
    socket: UdpSocket,
    target: SocketAddr,
    include_story: bool,
}

impl EventRelay {
    /// Binds an ephemeral local socket in the same address family as `target`.
    ///
    /// # Arguments
    ///
    /// * `target` - Destination of every datagram.
    /// * `include_story` - Whether notifications carry the full story text.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::Relay` if the local socket cannot be bound.
    pub async fn bind(target: SocketAddr, include_story: bool) -> StoryResult<Self> {
        let local: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).await.map_err(StoryError::Relay)?;

        Ok(Self {
            socket,
            target,
            include_story,
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Sends the notification for an accepted contribution.
    ///
    /// `story` is the document as it was right after the contribution was committed.
    pub async fn notify(
        &self,
        contribution: &Contribution,
        story: &StoryDocument,
    ) -> StoryResult<()> {
        let message = RelayMessage {
            kind: RELAY_STORY_WORD_TYPE,
            name: Some(&contribution.name),
            word: Some(&contribution.words),
            color: Some(&contribution.color),
            full_story: self.include_story.then(|| story.full_text()),
            message: None,
            timestamp: timestamp_now(),
        };
        self.send(&message).await
    }

    /// Sends a fixed diagnostic payload to check that the consumer is reachable.
    pub async fn ping(&self) -> StoryResult<()> {
        let message = RelayMessage {
            kind: RELAY_DEBUG_PING_TYPE,
            name: None,
            word: None,
            color: None,
            full_story: None,
            message: Some(RELAY_PING_MESSAGE),
            timestamp: timestamp_now(),
        };
        self.send(&message).await
    }

    async fn send(&self, message: &RelayMessage<'_>) -> StoryResult<()> {
        let payload = serde_json::to_vec(message).map_err(StoryError::Serialization)?;
        self.socket
            .send_to(&payload, self.target)
            .await
            .map_err(StoryError::Relay)?;
        tracing::debug!("relayed {} to {}", message.kind, self.target);
        Ok(())
    }
}

fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
