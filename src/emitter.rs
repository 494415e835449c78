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
use crate::config::Scenario;
use anyhow::Result;
use std::time::Duration;

/// Time hint offsets, in seconds, of the two `history` notifications
pub const HISTORY_OFFSETS: [i64; 2] = [-1800, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Finished,
}

/// State carried from one emission tick to the next.
#[derive(Debug)]
pub struct Emitter {
    scenario: Scenario,
    counter: u64,
    /// Only filled when the scenario closes everything at the end
    emitted: Vec<u32>,
}

impl Emitter {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            counter: 0,
            emitted: Vec::new(),
        }
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn emitted(&self) -> &[u32] {
        &self.emitted
    }

    pub fn interval(&self) -> Duration {
        self.scenario.interval
    }

    /// One timer tick. Sends the next notification, or once `close-after`
    /// notifications are out, closes all of them in the order they were
    /// sent and finishes.
    pub fn tick<B: NotificationBus + ?Sized>(&mut self, bus: &B, now: i64) -> Result<Tick> {
        if let Some(limit) = self.scenario.close_after {
            if self.emitted.len() >= limit {
                self.close_all(bus)?;
                return Ok(Tick::Finished);
            }
        }

        self.emit(bus, now)?;
        Ok(Tick::Continue)
    }

    /// Send one notification outside of a timer, returning its id.
    pub fn emit<B: NotificationBus + ?Sized>(&mut self, bus: &B, now: i64) -> Result<u32> {
        self.counter += 1;
        let notification = self.scenario.build(self.counter, now);
        let id = bus.notify(&notification)?;

        debug!("#{} -> {}: {}", self.counter, id, notification);
        println!("{}", id);

        if self.scenario.close_after.is_some() {
            self.emitted.push(id);
        }
        Ok(id)
    }

    fn close_all<B: NotificationBus + ?Sized>(&self, bus: &B) -> Result<()> {
        info!("Closing {} notifications", self.emitted.len());
        for id in self.emitted.iter() {
            bus.close_notification(*id)?;
        }
        Ok(())
    }
}

/// Two notifications from the same scenario, the first backdated half an
/// hour in its time hint. Counters run 1 and 2.
pub fn send_history<B: NotificationBus + ?Sized>(bus: &B, scenario: &Scenario, now: i64) -> Result<Vec<u32>> {
    let mut scenario = scenario.clone();
    let mut ids = Vec::with_capacity(HISTORY_OFFSETS.len());

    for (i, offset) in HISTORY_OFFSETS.iter().enumerate() {
        scenario.time_offset = Some(*offset);
        let id = bus.notify(&scenario.build(i as u64 + 1, now))?;
        println!("{}", id);
        ids.push(id);
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Preset;
    use crate::notification::{Hint, Notification, HINT_CATEGORY, HINT_PERSISTENT, HINT_TIME};
    use std::cell::RefCell;

    #[derive(Debug, PartialEq)]
    enum Call {
        Notify(Notification),
        Close(u32),
    }

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<Call>>,
        next_id: RefCell<u32>,
    }

    impl Recorder {
        fn notified(&self) -> Vec<Notification> {
            self.calls
                .borrow()
                .iter()
                .filter_map(|c| match c {
                    Call::Notify(n) => Some(n.clone()),
                    _ => None,
                })
                .collect()
        }

        fn closed(&self) -> Vec<u32> {
            self.calls
                .borrow()
                .iter()
                .filter_map(|c| match c {
                    Call::Close(id) => Some(*id),
                    _ => None,
                })
                .collect()
        }
    }

    impl NotificationBus for Recorder {
        fn notify(&self, n: &Notification) -> Result<u32> {
            self.calls.borrow_mut().push(Call::Notify(n.clone()));
            // Ids from a real server are not contiguous
            let mut id = self.next_id.borrow_mut();
            *id += 3;
            Ok(*id)
        }

        fn close_notification(&self, id: u32) -> Result<()> {
            self.calls.borrow_mut().push(Call::Close(id));
            Ok(())
        }
    }

    #[test]
    fn flood_closes_every_id_once_in_order() {
        let bus = Recorder::default();
        let mut em = Emitter::new(Scenario::preset(Preset::Flood));

        let mut ticks = 0;
        while em.tick(&bus, 0).unwrap() == Tick::Continue {
            ticks += 1;
            assert!(ticks <= 50, "emitter never finished");
        }

        assert_eq!(ticks, 50);
        assert_eq!(em.emitted().len(), 50);
        assert_eq!(bus.notified().len(), 50);
        assert_eq!(bus.closed(), em.emitted());

        // All closes come after the last notify
        let calls = bus.calls.borrow();
        let first_close = calls.iter().position(|c| matches!(c, Call::Close(_))).unwrap();
        assert_eq!(first_close, 50);
        assert_eq!(calls.len(), 100);
    }

    #[test]
    fn counter_increments_by_one() {
        let bus = Recorder::default();
        let mut em = Emitter::new(Scenario::preset(Preset::Sms));

        for expected in 1..=20u64 {
            assert_eq!(em.tick(&bus, 0).unwrap(), Tick::Continue);
            assert_eq!(em.counter(), expected);
        }

        let bodies: Vec<String> = bus.notified().into_iter().map(|n| n.body).collect();
        assert_eq!(bodies[0], "Message 1");
        assert_eq!(bodies[19], "Message 20");
    }

    #[test]
    fn endless_variants_keep_no_ids() {
        let bus = Recorder::default();
        let mut em = Emitter::new(Scenario::preset(Preset::Email));
        for _ in 0..5 {
            em.tick(&bus, 0).unwrap();
        }
        assert!(em.emitted().is_empty());
        assert!(bus.closed().is_empty());
    }

    #[test]
    fn every_notification_carries_the_variant_hints() {
        let bus = Recorder::default();
        let mut em = Emitter::new(Scenario::preset(Preset::Sms));
        for _ in 0..3 {
            em.tick(&bus, 0).unwrap();
        }
        for n in bus.notified() {
            assert_eq!(n.hints.category(), Some("sms-message"));
            assert!(n.hints.get(HINT_PERSISTENT).is_some());
            assert!(n.hints.get(HINT_CATEGORY).is_some());
        }
    }

    #[test]
    fn history_backdates_the_first_email() {
        let bus = Recorder::default();
        let now = 1_700_000_000;

        let ids = send_history(&bus, &Scenario::preset(Preset::Email), now).unwrap();
        assert_eq!(ids, vec![3, 6]);

        let sent = bus.notified();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].body, "Subject 1");
        assert_eq!(sent[1].body, "Subject 2");
        assert_eq!(sent[0].hints.get(HINT_TIME), Some(&Hint::Int64(now - 1800)));
        assert_eq!(sent[1].hints.get(HINT_TIME), Some(&Hint::Int64(now)));
        for n in &sent {
            assert_eq!(n.summary, "Jan Arne Petersen");
            assert_eq!(n.hints.category(), Some("email-message"));
        }
        assert!(bus.closed().is_empty());
    }

    #[test]
    fn close_after_zero_finishes_immediately() {
        let bus = Recorder::default();
        let mut scenario = Scenario::preset(Preset::Flood);
        scenario.close_after = Some(0);
        let mut em = Emitter::new(scenario);

        assert_eq!(em.tick(&bus, 0).unwrap(), Tick::Finished);
        assert!(bus.calls.borrow().is_empty());
    }
}
