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

use crate::notification::{
    Action, Hint, Hints, Notification, HINT_CATEGORY, HINT_NO_NOTIFICATION_WINDOW,
    HINT_PERSISTENT, HINT_TIME,
};
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use strum_macros::Display;

/// Placeholder replaced by the emission counter in summary and body
pub const COUNTER_PLACEHOLDER: &str = "{n}";

#[derive(Debug, PartialEq, Deserialize, Copy, Clone, Display, ValueEnum)]
#[serde(rename_all(deserialize = "kebab-case"))]
#[strum(serialize_all = "kebab-case")]
pub enum Preset {
    Email,
    Auth,
    Sms,
    Flood,
}

/// A scenario file, every key optional. Whatever is set here overrides
/// the preset it is applied on top of.
#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all(deserialize = "kebab-case"), deny_unknown_fields)]
pub struct ScenarioConfig {
    pub preset: Option<Preset>,
    pub app_name: Option<String>,
    pub icon: Option<String>,
    pub summary: Option<String>,
    pub body: Option<String>,
    pub actions: Option<Vec<(String, String)>>,
    pub category: Option<String>,
    pub time_offset: Option<i64>,
    pub persistent: Option<bool>,
    pub no_notification_window: Option<bool>,
    pub expire_timeout: Option<i32>,
    /// Milliseconds between ticks
    pub interval: Option<u64>,
    pub close_after: Option<usize>,
}

impl ScenarioConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let config = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;

        Self::parse(&config)
            .with_context(|| format!("Failed to parse scenario file {}", path.display()))
    }

    pub fn parse(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }
}

/// A fully resolved notification template plus its timing.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub app_name: String,
    pub icon: String,
    pub summary: String,
    pub body: String,
    pub actions: Vec<Action>,
    pub category: String,
    /// Seconds relative to now, `None` means no time hint
    pub time_offset: Option<i64>,
    pub persistent: Option<bool>,
    pub no_notification_window: Option<bool>,
    pub expire_timeout: i32,
    pub interval: Duration,
    pub close_after: Option<usize>,
}

impl Scenario {
    pub fn preset(preset: Preset) -> Self {
        let default_actions = vec![Action::new("default", "default")];
        match preset {
            Preset::Email => Self {
                app_name: "test-send.py".into(),
                icon: "qgn_list_messagin".into(),
                summary: "Jan Arne Petersen".into(),
                body: "Subject {n}".into(),
                actions: default_actions,
                category: "email-message".into(),
                time_offset: Some(0),
                persistent: None,
                no_notification_window: None,
                expire_timeout: 0,
                interval: Duration::from_millis(250),
                close_after: None,
            },
            Preset::Auth => Self {
                app_name: "test-auth.py".into(),
                icon: "qgn_list_gene_lock".into(),
                summary: "Authentication {n}".into(),
                body: "Password needed".into(),
                actions: default_actions,
                category: "auth-request".into(),
                time_offset: None,
                persistent: None,
                no_notification_window: Some(true),
                expire_timeout: 0,
                interval: Duration::from_millis(100),
                close_after: None,
            },
            Preset::Sms => Self {
                app_name: "test-sms.py".into(),
                icon: "general_sms".into(),
                summary: "+358 40 123 {n}".into(),
                body: "Message {n}".into(),
                actions: default_actions,
                category: "sms-message".into(),
                time_offset: None,
                persistent: Some(true),
                no_notification_window: None,
                expire_timeout: 0,
                interval: Duration::from_millis(50),
                close_after: None,
            },
            Preset::Flood => Self {
                app_name: "test-flood.py".into(),
                icon: "qgn_list_messagin".into(),
                summary: "Flood {n}".into(),
                body: "Subject {n}".into(),
                actions: default_actions,
                category: "email-message".into(),
                time_offset: None,
                persistent: None,
                no_notification_window: None,
                expire_timeout: 0,
                interval: Duration::from_millis(50),
                close_after: Some(50),
            },
        }
    }

    /// Resolve a stack of configs, later ones winning. The preset comes
    /// from the last layer that names one.
    pub fn resolve(fallback: Preset, layers: &[&ScenarioConfig]) -> Self {
        let preset = layers
            .iter()
            .rev()
            .find_map(|l| l.preset)
            .unwrap_or(fallback);

        let mut s = Self::preset(preset);
        for layer in layers {
            s.apply(layer);
        }
        s
    }

    /// Overlay every key `config` sets. The preset key is ignored here.
    pub fn apply(&mut self, config: &ScenarioConfig) {
        if let Some(ref v) = config.app_name {
            self.app_name = v.clone();
        }
        if let Some(ref v) = config.icon {
            self.icon = v.clone();
        }
        if let Some(ref v) = config.summary {
            self.summary = v.clone();
        }
        if let Some(ref v) = config.body {
            self.body = v.clone();
        }
        if let Some(ref v) = config.actions {
            self.actions = v.iter().map(|(id, label)| Action::new(id, label)).collect();
        }
        if let Some(ref v) = config.category {
            self.category = v.clone();
        }
        if config.time_offset.is_some() {
            self.time_offset = config.time_offset;
        }
        if config.persistent.is_some() {
            self.persistent = config.persistent;
        }
        if config.no_notification_window.is_some() {
            self.no_notification_window = config.no_notification_window;
        }
        if let Some(v) = config.expire_timeout {
            self.expire_timeout = v;
        }
        if let Some(v) = config.interval {
            self.interval = Duration::from_millis(v);
        }
        if config.close_after.is_some() {
            self.close_after = config.close_after;
        }
    }

    /// Build the parameters for one Notify call. `now` is the unix time
    /// in seconds the time hint is computed from.
    pub fn build(&self, counter: u64, now: i64) -> Notification {
        let n = counter.to_string();

        let mut hints = Hints::new();
        hints.set(HINT_CATEGORY, Hint::String(self.category.clone()));
        if let Some(offset) = self.time_offset {
            hints.set(HINT_TIME, Hint::Int64(now.saturating_add(offset)));
        }
        if let Some(p) = self.persistent {
            hints.set(HINT_PERSISTENT, Hint::Byte(p as u8));
        }
        if let Some(w) = self.no_notification_window {
            hints.set(HINT_NO_NOTIFICATION_WINDOW, Hint::Byte(w as u8));
        }

        Notification {
            app_name: self.app_name.clone(),
            replaces_id: 0,
            icon: self.icon.clone(),
            summary: self.summary.replace(COUNTER_PLACEHOLDER, &n),
            body: self.body.replace(COUNTER_PLACEHOLDER, &n),
            actions: self.actions.clone(),
            hints,
            expire_timeout: self.expire_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_carry_their_category() {
        let cases = [
            (Preset::Email, "email-message"),
            (Preset::Auth, "auth-request"),
            (Preset::Sms, "sms-message"),
            (Preset::Flood, "email-message"),
        ];
        for (preset, category) in cases {
            let n = Scenario::preset(preset).build(1, 0);
            assert_eq!(n.hints.category(), Some(category), "preset {}", preset);
        }
    }

    #[test]
    fn flag_hints_only_where_the_preset_sets_them() {
        let sms = Scenario::preset(Preset::Sms).build(1, 0);
        assert_eq!(sms.hints.get(HINT_PERSISTENT), Some(&Hint::Byte(1)));
        assert_eq!(sms.hints.get(HINT_NO_NOTIFICATION_WINDOW), None);

        let auth = Scenario::preset(Preset::Auth).build(1, 0);
        assert_eq!(auth.hints.get(HINT_NO_NOTIFICATION_WINDOW), Some(&Hint::Byte(1)));
        assert_eq!(auth.hints.get(HINT_PERSISTENT), None);

        let email = Scenario::preset(Preset::Email).build(1, 0);
        assert_eq!(email.hints.get(HINT_PERSISTENT), None);
        assert_eq!(email.hints.get(HINT_NO_NOTIFICATION_WINDOW), None);
    }

    #[test]
    fn counter_is_substituted() {
        let n = Scenario::preset(Preset::Sms).build(42, 0);
        assert_eq!(n.summary, "+358 40 123 42");
        assert_eq!(n.body, "Message 42");
        assert_eq!(n.flat_actions(), vec!["default", "default"]);
    }

    #[test]
    fn time_hint_is_relative_to_now() {
        let mut s = Scenario::preset(Preset::Email);
        s.time_offset = Some(-1800);
        let n = s.build(1, 10_000);
        assert_eq!(n.hints.get(HINT_TIME), Some(&Hint::Int64(8_200)));

        let sms = Scenario::preset(Preset::Sms).build(1, 10_000);
        assert_eq!(sms.hints.get(HINT_TIME), None);
    }

    #[test]
    fn huge_time_offsets_saturate() {
        let config = ScenarioConfig::parse("time-offset: 9223372036854775807\n").unwrap();
        let n = Scenario::resolve(Preset::Sms, &[&config]).build(1, 1_700_000_000);
        assert_eq!(n.hints.get(HINT_TIME), Some(&Hint::Int64(i64::MAX)));

        let config = ScenarioConfig::parse("time-offset: -9223372036854775808\n").unwrap();
        let n = Scenario::resolve(Preset::Sms, &[&config]).build(1, -5);
        assert_eq!(n.hints.get(HINT_TIME), Some(&Hint::Int64(i64::MIN)));
    }

    #[test]
    fn config_overlays_preset() {
        let config = ScenarioConfig::parse(
            r#"
preset: sms
summary: "Hello {n}"
category: im-message
actions:
  - [default, Open]
  - [reply, Reply]
no-notification-window: false
interval: 200
close-after: 5
"#,
        )
        .unwrap();

        let s = Scenario::resolve(Preset::Email, &[&config]);
        assert_eq!(s.app_name, "test-sms.py");
        assert_eq!(s.summary, "Hello {n}");
        assert_eq!(s.category, "im-message");
        assert_eq!(s.actions.len(), 2);
        assert_eq!(s.persistent, Some(true));
        assert_eq!(s.no_notification_window, Some(false));
        assert_eq!(s.interval, Duration::from_millis(200));
        assert_eq!(s.close_after, Some(5));

        let n = s.build(3, 0);
        assert_eq!(n.hints.get(HINT_NO_NOTIFICATION_WINDOW), Some(&Hint::Byte(0)));
    }

    #[test]
    fn empty_config_is_the_fallback_preset() {
        let config = ScenarioConfig::parse("{}").unwrap();
        assert_eq!(
            Scenario::resolve(Preset::Auth, &[&config]),
            Scenario::preset(Preset::Auth)
        );
    }

    #[test]
    fn later_layers_win() {
        let file = ScenarioConfig::parse("preset: auth\nsummary: from file\nicon: file-icon\n").unwrap();
        let cli = ScenarioConfig {
            summary: Some("from cli".into()),
            ..Default::default()
        };

        let s = Scenario::resolve(Preset::Email, &[&file, &cli]);
        assert_eq!(s.category, "auth-request");
        assert_eq!(s.summary, "from cli");
        assert_eq!(s.icon, "file-icon");

        let cli = ScenarioConfig {
            preset: Some(Preset::Sms),
            ..Default::default()
        };
        let s = Scenario::resolve(Preset::Email, &[&file, &cli]);
        assert_eq!(s.category, "sms-message");
        assert_eq!(s.summary, "from file");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(ScenarioConfig::parse("colour: blue\n").is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(ScenarioConfig::load(Path::new("/nonexistent/notiprobe.yaml")).is_err());
    }
}
