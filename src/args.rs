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

use crate::config::{Preset, ScenarioConfig};
use crate::notification::DialogKind;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Poke at the desktop notification service on the session bus
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// YAML scenario file, applied on top of the preset
    #[arg(short, long = "config")]
    pub config_path: Option<PathBuf>,

    /// Timeout for each method call, in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub call_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send notifications once and exit
    Send(SendArgs),
    /// Send a notification on every timer tick until killed
    Run(RunArgs),
    /// Close notifications by id, in the given order
    Close {
        #[arg(required = true)]
        ids: Vec<u32>,
    },
    /// Print NotificationClosed and ActionInvoked signals until killed
    Listen,
    /// Print the server information and capabilities
    Info,
    /// Show a system infoprint
    Infoprint { message: String },
    /// Show a system note dialog
    Dialog {
        message: String,
        #[arg(long, value_enum, default_value_t = DialogKind::Notice)]
        kind: DialogKind,
        /// Button label, no button when empty
        #[arg(long, default_value = "")]
        label: String,
    },
    /// Send two email notifications, half an hour apart in their time hints
    History,
}

/// Per-field overrides shared by `send` and `run`.
#[derive(ClapArgs, Debug, Default)]
pub struct ScenarioArgs {
    #[arg(short, long, value_enum)]
    pub preset: Option<Preset>,
    #[arg(long)]
    pub app_name: Option<String>,
    #[arg(long)]
    pub icon: Option<String>,
    /// `{n}` is replaced with the emission counter
    #[arg(long)]
    pub summary: Option<String>,
    /// `{n}` is replaced with the emission counter
    #[arg(long)]
    pub body: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    /// Seconds relative to now for the time hint
    #[arg(long, allow_hyphen_values = true)]
    pub time_offset: Option<i64>,
    /// Set the persistent hint
    #[arg(long)]
    pub persistent: bool,
    /// Set the no-notification-window hint
    #[arg(long)]
    pub no_window: bool,
    #[arg(long, allow_hyphen_values = true)]
    pub expire_timeout: Option<i32>,
}

impl ScenarioArgs {
    pub fn to_config(&self) -> ScenarioConfig {
        ScenarioConfig {
            preset: self.preset,
            app_name: self.app_name.clone(),
            icon: self.icon.clone(),
            summary: self.summary.clone(),
            body: self.body.clone(),
            category: self.category.clone(),
            time_offset: self.time_offset,
            persistent: self.persistent.then_some(true),
            no_notification_window: self.no_window.then_some(true),
            expire_timeout: self.expire_timeout,
            ..Default::default()
        }
    }
}

#[derive(ClapArgs, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,
    /// How many notifications to send
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: u64,
    /// Keep running and print signals afterwards
    #[arg(long)]
    pub listen: bool,
}

#[derive(ClapArgs, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub scenario: ScenarioArgs,
    /// Milliseconds between notifications
    #[arg(short, long)]
    pub interval: Option<u64>,
    /// Close everything and stop after this many notifications
    #[arg(long)]
    pub close_after: Option<usize>,
    /// Don't subscribe to signals
    #[arg(long, conflicts_with = "require_signals")]
    pub no_signals: bool,
    /// Exit if the signal subscription fails
    #[arg(long)]
    pub require_signals: bool,
}

impl RunArgs {
    pub fn to_config(&self) -> ScenarioConfig {
        ScenarioConfig {
            interval: self.interval,
            close_after: self.close_after,
            ..self.scenario.to_config()
        }
    }
}
