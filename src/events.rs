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

use crate::bus::NotificationBus;
use crate::emitter::{Emitter, Tick};
use anyhow::{Context, Result};
use calloop::timer::{TimeoutAction, Timer};
use calloop::{EventLoop, LoopSignal};
use dbus::message::Message;
use std::fmt;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// How long the loop sleeps when neither the timer nor the bus has
/// anything for it.
const IDLE_TIMEOUT: Duration = Duration::from_millis(20);

/// Signals broadcast by the notification service.
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyEvent {
    /// `reason` is only sent by servers following the current spec
    Closed { id: u32, reason: Option<u32> },
    ActionInvoked { id: u32, action_key: String },
}

impl NotifyEvent {
    pub fn closed_from_message(msg: &Message) -> Option<Self> {
        match msg.get2::<u32, u32>() {
            (Some(id), reason) => Some(NotifyEvent::Closed { id, reason }),
            _ => None,
        }
    }

    pub fn action_from_message(msg: &Message) -> Option<Self> {
        match msg.read2::<u32, String>() {
            Ok((id, action_key)) => Some(NotifyEvent::ActionInvoked { id, action_key }),
            Err(_) => None,
        }
    }
}

impl fmt::Display for NotifyEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NotifyEvent::Closed { id, reason: Some(r) } => {
                write!(f, "Notification {} closed (reason {})", id, r)
            }
            NotifyEvent::Closed { id, reason: None } => write!(f, "Notification {} closed", id),
            NotifyEvent::ActionInvoked { id, action_key } => {
                write!(f, "Action '{}' invoked on notification {}", action_key, id)
            }
        }
    }
}

/// All event sources must implement this trait.
/// Event sources are responsible to handling any pending events
/// without blocking. An error causes the loop to exit.
pub trait EventSource {
    fn process_pending(&mut self) -> Result<()>;
}

struct LoopData<B> {
    bus: B,
    emitter: Option<Emitter>,
    events: Receiver<NotifyEvent>,
    signal: LoopSignal,
    error: Option<anyhow::Error>,
}

impl<B: NotificationBus + EventSource> LoopData<B> {
    fn fail(&mut self, e: anyhow::Error) {
        if self.error.is_none() {
            self.error = Some(e);
        }
        self.signal.stop();
    }

    fn dispatch_bus(&mut self) {
        if let Err(e) = self.bus.process_pending() {
            self.fail(e);
            return;
        }

        while let Ok(event) = self.events.try_recv() {
            trace!("Received event: {:?}", event);
            println!("{}", event);
        }
    }

    fn on_timer(&mut self, interval: Duration) -> TimeoutAction {
        let em = match self.emitter.as_mut() {
            Some(em) => em,
            None => return TimeoutAction::Drop,
        };

        let now = chrono::Local::now().timestamp();
        match em.tick(&self.bus, now) {
            Ok(Tick::Continue) => TimeoutAction::ToDuration(interval),
            Ok(Tick::Finished) => {
                info!("Emitter finished after {} notifications", em.counter());
                self.signal.stop();
                TimeoutAction::Drop
            }
            Err(e) => {
                error!("Emission failed on tick {}", em.counter());
                self.fail(e);
                TimeoutAction::Drop
            }
        }
    }
}

pub struct NotifyEventLoop;

impl NotifyEventLoop {
    /// Run until the emitter finishes or the bus fails. Without an
    /// emitter, or with one that never finishes, this only returns on
    /// error.
    ///
    /// Returns the emitter so callers can report what was sent.
    pub fn run<B>(bus: B, emitter: Option<Emitter>, events: Receiver<NotifyEvent>) -> Result<Option<Emitter>>
    where
        B: NotificationBus + EventSource,
    {
        let mut event_loop: EventLoop<LoopData<B>> =
            EventLoop::try_new().context("Failed to create event loop")?;

        if let Some(ref em) = emitter {
            let interval = em.interval();
            info!("Emitting every {}ms", interval.as_millis());
            event_loop
                .handle()
                .insert_source(Timer::from_duration(interval), move |_, _, data: &mut LoopData<B>| {
                    data.on_timer(interval)
                })
                .map_err(|e| anyhow!("Failed to insert emission timer: {}", e.error))?;
        }

        let mut data = LoopData {
            bus,
            emitter,
            events,
            signal: event_loop.get_signal(),
            error: None,
        };

        event_loop
            .run(IDLE_TIMEOUT, &mut data, |data| data.dispatch_bus())
            .context("Event loop failed")?;

        // Pick up whatever the service sent in response to the last calls
        data.dispatch_bus();

        match data.error.take() {
            Some(e) => Err(e),
            None => Ok(data.emitter),
        }
    }
}
