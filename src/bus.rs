/*
* Notiprobe
* Copyright (C) 2022 Caleb Connolly <caleb@connolly.tech>
*
* This program is free software; you can redistribute it and/or modify
* it under the terms of the GNU General Public License as published by
* the Free Software Foundation; either version 2 of the License, or
* (at your option) any later version.
*
* This program is distributed in the hope that it will be useful,
* but WITHOUT ANY WARRANTY; without even the implied warranty of
* MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
* GNU General Public License for more details.
*
* You should have received a copy of the GNU General Public License along
* with this program; if not, write to the Free Software Foundation, Inc.,
* 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.
*/

use crate::events::{EventSource, NotifyEvent};
use crate::notification::{DialogKind, Notification};
use anyhow::{Context, Result};
use dbus::blocking::{BlockingSender, Connection, Proxy};
use dbus::message::{MatchRule, Message};
use std::fmt;
use std::sync::mpsc::Sender;
use std::time::Duration;

pub const NOTIFICATIONS_BUS_NAME: &str = "org.freedesktop.Notifications";
pub const NOTIFICATIONS_OBJECT_PATH: &str = "/org/freedesktop/Notifications";
pub const NOTIFICATIONS_INTERFACE: &str = "org.freedesktop.Notifications";

const SIGNAL_NOTIFICATION_CLOSED: &str = "NotificationClosed";
const SIGNAL_ACTION_INVOKED: &str = "ActionInvoked";

/// The two calls the emission loop needs. Implemented by [`Client`] and by
/// fakes in tests.
pub trait NotificationBus {
    fn notify(&self, notification: &Notification) -> Result<u32>;
    fn close_notification(&self, id: u32) -> Result<()>;
}

/// Outcome of hooking up the signal handlers. The connection is usable
/// either way; it is up to the caller whether a failure matters.
#[derive(Debug)]
pub enum Subscription {
    Active,
    Failed(anyhow::Error),
}

impl Subscription {
    /// A failure is only an error when `required`; otherwise it is logged
    /// and the caller carries on without signal output.
    pub fn require(self, required: bool) -> Result<()> {
        match self {
            Subscription::Active => Ok(()),
            Subscription::Failed(e) if required => Err(e.context("Signal subscription failed")),
            Subscription::Failed(e) => {
                warn!("Signal subscription failed, closed/action signals will not be shown: {:#}", e);
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerInfo {
    pub name: String,
    pub vendor: String,
    pub version: String,
    /// Older servers reply with only the first three fields
    pub spec_version: Option<String>,
}

impl fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({}) version {}", self.name, self.vendor, self.version)?;
        if let Some(ref spec) = self.spec_version {
            write!(f, ", spec {}", spec)?;
        }
        Ok(())
    }
}

pub struct Client {
    connection: Connection,
    timeout: Duration,
}

impl Client {
    pub fn new(timeout: Duration) -> Result<Self> {
        debug!("Connecting to session bus");
        let connection = match Connection::new_session() {
            Ok(c) => c,
            Err(e) => {
                bail!("Failed to connect to DBUS session bus, is DBUS_SESSION_BUS_ADDRESS set?: {}", e);
            }
        };

        Ok(Self {
            connection,
            timeout,
        })
    }

    fn proxy(&self) -> Proxy<'_, &Connection> {
        self.connection.with_proxy(
            NOTIFICATIONS_BUS_NAME,
            NOTIFICATIONS_OBJECT_PATH,
            self.timeout,
        )
    }

    /// Subscribe to NotificationClosed and ActionInvoked, forwarding both
    /// to `tx`. Events are only delivered while the connection is being
    /// processed, see [`EventSource`].
    pub fn subscribe(&self, tx: Sender<NotifyEvent>) -> Subscription {
        match self.add_signal_matches(tx) {
            Ok(()) => {
                info!("DBUS: subscribed to notification signals");
                Subscription::Active
            }
            Err(e) => Subscription::Failed(e),
        }
    }

    fn add_signal_matches(&self, tx: Sender<NotifyEvent>) -> Result<()> {
        let closed_tx = tx.clone();
        let rule = MatchRule::new_signal(NOTIFICATIONS_INTERFACE, SIGNAL_NOTIFICATION_CLOSED);
        self.connection
            .add_match(rule, move |_: (), _, msg: &Message| {
                forward(&closed_tx, NotifyEvent::closed_from_message(msg))
            })
            .context("Failed to subscribe to NotificationClosed")?;

        let rule = MatchRule::new_signal(NOTIFICATIONS_INTERFACE, SIGNAL_ACTION_INVOKED);
        self.connection
            .add_match(rule, move |_: (), _, msg: &Message| {
                forward(&tx, NotifyEvent::action_from_message(msg))
            })
            .context("Failed to subscribe to ActionInvoked")?;

        Ok(())
    }

    pub fn get_capabilities(&self) -> Result<Vec<String>> {
        let (caps,): (Vec<String>,) = self
            .proxy()
            .method_call(NOTIFICATIONS_INTERFACE, "GetCapabilities", ())
            .context("GetCapabilities failed")?;
        Ok(caps)
    }

    pub fn get_server_information(&self) -> Result<ServerInfo> {
        // Read the reply by hand, the spec version field is optional
        let msg = Message::new_method_call(
            NOTIFICATIONS_BUS_NAME,
            NOTIFICATIONS_OBJECT_PATH,
            NOTIFICATIONS_INTERFACE,
            "GetServerInformation",
        )
        .map_err(|e| anyhow!("Failed to build GetServerInformation call: {}", e))?;

        let reply = self
            .connection
            .send_with_reply_and_block(msg, self.timeout)
            .context("GetServerInformation failed")?;

        match reply.get4::<String, String, String, String>() {
            (Some(name), Some(vendor), Some(version), spec_version) => Ok(ServerInfo {
                name,
                vendor,
                version,
                spec_version,
            }),
            _ => Err(anyhow!("Malformed GetServerInformation reply: {:?}", reply)),
        }
    }

    pub fn system_note_infoprint(&self, message: &str) -> Result<u32> {
        let (id,): (u32,) = self
            .proxy()
            .method_call(NOTIFICATIONS_INTERFACE, "SystemNoteInfoprint", (message,))
            .context("SystemNoteInfoprint failed")?;
        Ok(id)
    }

    pub fn system_note_dialog(&self, message: &str, kind: DialogKind, label: &str) -> Result<u32> {
        let (id,): (u32,) = self
            .proxy()
            .method_call(
                NOTIFICATIONS_INTERFACE,
                "SystemNoteDialog",
                (message, kind.wire_value(), label),
            )
            .context("SystemNoteDialog failed")?;
        Ok(id)
    }
}

impl NotificationBus for Client {
    fn notify(&self, n: &Notification) -> Result<u32> {
        trace!("Notify {}", n);
        let (id,): (u32,) = self
            .proxy()
            .method_call(
                NOTIFICATIONS_INTERFACE,
                "Notify",
                (
                    n.app_name.as_str(),
                    n.replaces_id,
                    n.icon.as_str(),
                    n.summary.as_str(),
                    n.body.as_str(),
                    n.flat_actions(),
                    n.hints.to_prop_map(),
                    n.expire_timeout,
                ),
            )
            .context("Notify failed")?;
        Ok(id)
    }

    fn close_notification(&self, id: u32) -> Result<()> {
        let _: () = self
            .proxy()
            .method_call(NOTIFICATIONS_INTERFACE, "CloseNotification", (id,))
            .with_context(|| format!("CloseNotification({}) failed", id))?;
        Ok(())
    }
}

impl EventSource for Client {
    fn process_pending(&mut self) -> Result<()> {
        // Drain everything that is already queued, never block
        loop {
            match self.connection.process(Duration::from_millis(0)) {
                Ok(true) => continue,
                Ok(false) => return Ok(()),
                Err(e) => return Err(anyhow!("Failed to process DBUS messages: {}", e)),
            }
        }
    }
}

/// Returns whether the match should stay registered.
fn forward(tx: &Sender<NotifyEvent>, event: Option<NotifyEvent>) -> bool {
    let event = match event {
        Some(e) => e,
        None => {
            warn!("Failed to parse notification signal");
            return true;
        }
    };

    match tx.send(event) {
        Ok(_) => true,
        Err(e) => {
            warn!("Failed to send DBUS signal to event loop: {}", e);
            false
        }
    }
}
