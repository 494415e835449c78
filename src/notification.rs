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

use clap::ValueEnum;
use dbus::arg::{PropMap, RefArg, Variant};
use std::collections::BTreeMap;
use std::fmt;
use strum_macros::Display;

pub const HINT_CATEGORY: &str = "category";
pub const HINT_TIME: &str = "time";
pub const HINT_PERSISTENT: &str = "persistent";
pub const HINT_NO_NOTIFICATION_WINDOW: &str = "no-notification-window";

/// A single hint value, typed the way the service expects it on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Hint {
    String(String),
    Int64(i64),
    Byte(u8),
}

impl Hint {
    fn to_variant(&self) -> Variant<Box<dyn RefArg>> {
        match self {
            Hint::String(s) => Variant(Box::new(s.clone()) as Box<dyn RefArg>),
            Hint::Int64(i) => Variant(Box::new(*i) as Box<dyn RefArg>),
            Hint::Byte(b) => Variant(Box::new(*b) as Box<dyn RefArg>),
        }
    }
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Hint::String(s) => write!(f, "\"{}\"", s),
            Hint::Int64(i) => write!(f, "int64 {}", i),
            Hint::Byte(b) => write!(f, "byte {}", b),
        }
    }
}

/// Hints only appear in the map when explicitly set, nothing is
/// defaulted on the way out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hints(BTreeMap<String, Hint>);

impl Hints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, hint: Hint) {
        self.0.insert(key.to_string(), hint);
    }

    pub fn get(&self, key: &str) -> Option<&Hint> {
        self.0.get(key)
    }

    pub fn category(&self) -> Option<&str> {
        match self.get(HINT_CATEGORY) {
            Some(Hint::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn to_prop_map(&self) -> PropMap {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_variant()))
            .collect()
    }
}

impl fmt::Display for Hints {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", k, v)?;
        }
        write!(f, "}}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub id: String,
    pub label: String,
}

impl Action {
    pub fn new(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
        }
    }
}

/// Everything a Notify call takes.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub app_name: String,
    pub replaces_id: u32,
    pub icon: String,
    pub summary: String,
    pub body: String,
    pub actions: Vec<Action>,
    pub hints: Hints,
    /// Milliseconds, -1 lets the server decide and 0 never expires
    pub expire_timeout: i32,
}

impl Notification {
    /// The wire form of the action list alternates ids and labels
    pub fn flat_actions(&self) -> Vec<String> {
        self.actions
            .iter()
            .flat_map(|a| [a.id.clone(), a.label.clone()])
            .collect()
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{}] '{}' / '{}' icon={} hints={}",
            self.app_name, self.summary, self.body, self.icon, self.hints
        )
    }
}

/// Dialog types understood by SystemNoteDialog, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, ValueEnum)]
#[strum(serialize_all = "kebab-case")]
pub enum DialogKind {
    Warning,
    Error,
    Notice,
    Wait,
    Progress,
}

impl DialogKind {
    pub fn wire_value(self) -> u32 {
        match self {
            DialogKind::Warning => 0,
            DialogKind::Error => 1,
            DialogKind::Notice => 2,
            DialogKind::Wait => 3,
            DialogKind::Progress => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_are_flattened_in_order() {
        let n = Notification {
            app_name: "test".into(),
            replaces_id: 0,
            icon: "".into(),
            summary: "".into(),
            body: "".into(),
            actions: vec![Action::new("default", "Open"), Action::new("dismiss", "Dismiss")],
            hints: Hints::new(),
            expire_timeout: 0,
        };
        assert_eq!(n.flat_actions(), vec!["default", "Open", "dismiss", "Dismiss"]);
    }

    #[test]
    fn hints_keep_their_wire_types() {
        let mut hints = Hints::new();
        hints.set(HINT_CATEGORY, Hint::String("sms-message".into()));
        hints.set(HINT_PERSISTENT, Hint::Byte(1));
        hints.set(HINT_TIME, Hint::Int64(1_600_000_000));

        let map = hints.to_prop_map();
        assert_eq!(map.len(), 3);
        assert_eq!(map[HINT_CATEGORY].0.as_str(), Some("sms-message"));
        assert_eq!(map[HINT_PERSISTENT].0.as_u64(), Some(1));
        assert_eq!(map[HINT_TIME].0.as_i64(), Some(1_600_000_000));
        assert_eq!(hints.category(), Some("sms-message"));
    }

    #[test]
    fn unset_hints_are_absent() {
        let mut hints = Hints::new();
        hints.set(HINT_CATEGORY, Hint::String("email-message".into()));
        let map = hints.to_prop_map();
        assert!(!map.contains_key(HINT_PERSISTENT));
        assert!(!map.contains_key(HINT_NO_NOTIFICATION_WINDOW));
    }

    #[test]
    fn dialog_kinds() {
        assert_eq!(DialogKind::from_str("progress", false).unwrap().wire_value(), 4);
        assert_eq!(DialogKind::Warning.wire_value(), 0);
        assert_eq!(DialogKind::Notice.to_string(), "notice");
    }
}
