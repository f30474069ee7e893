//! Fan-out of chat lines and join/leave notices.
//!
//! The broadcaster takes a registry snapshot and enqueues the rendered line
//! on every member's outbound queue. Enqueueing never waits, so one stalled
//! recipient cannot delay delivery to the rest.

use relay_core::{ChatMessage, SessionId};
use relay_protocol::ServerLine;
use tracing::debug;

use crate::registry::RegistryHandle;
use crate::session::Delivery;

/// Per-recipient outcome counts for one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Recipients whose queue accepted the line
    pub delivered: usize,
    /// Of those, recipients that lost their oldest pending line to make room
    pub evicted: usize,
    /// Recipients whose full queue discarded the line
    pub dropped: usize,
    /// Recipients already closing
    pub closed: usize,
}

impl FanoutReport {
    /// Number of recipients considered.
    pub fn recipients(&self) -> usize {
        self.delivered + self.dropped + self.closed
    }

    fn record(&mut self, outcome: Delivery) {
        match outcome {
            Delivery::Queued => self.delivered += 1,
            Delivery::EvictedOldest => {
                self.delivered += 1;
                self.evicted += 1;
            }
            Delivery::DroppedNewest => self.dropped += 1,
            Delivery::Closed => self.closed += 1,
        }
    }
}

/// Delivers lines to registered sessions.
#[derive(Clone)]
pub struct Broadcaster {
    registry: RegistryHandle,
}

impl Broadcaster {
    pub fn new(registry: RegistryHandle) -> Self {
        Self { registry }
    }

    /// Relays a chat line to every member except its sender.
    pub async fn broadcast(&self, message: &ChatMessage) -> FanoutReport {
        let line = ServerLine::chat(message).to_wire();
        self.fan_out(line, Some(message.sender_id)).await
    }

    /// Sends a join/leave notice.
    ///
    /// `except` skips one member, used so a joining session does not see
    /// its own join notice.
    pub async fn announce(&self, notice: ServerLine<'_>, except: Option<SessionId>) -> FanoutReport {
        let line = notice.to_wire();
        self.fan_out(line, except).await
    }

    async fn fan_out(&self, line: String, except: Option<SessionId>) -> FanoutReport {
        let members = self.registry.snapshot().await;
        let mut report = FanoutReport::default();

        for member in members.iter().filter(|m| Some(m.id) != except) {
            let outcome = member.deliver(line.clone());
            match outcome {
                Delivery::EvictedOldest | Delivery::DroppedNewest => {
                    debug!(
                        session_id = %member.id,
                        outcome = ?outcome,
                        "Outbound queue full"
                    );
                }
                Delivery::Queued | Delivery::Closed => {}
            }
            report.record(outcome);
        }

        report
    }
}
