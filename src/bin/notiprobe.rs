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

use anyhow::Result;
use clap::Parser;
use log::info;
use notiprobe::args::{Args, Command, RunArgs, SendArgs};
use notiprobe::bus::{Client, NotificationBus};
use notiprobe::config::{Preset, Scenario, ScenarioConfig};
use notiprobe::emitter::{self, Emitter};
use notiprobe::events::NotifyEventLoop;
use std::io::Write;
use std::sync::mpsc::channel;
use std::time::Duration;

fn main() -> Result<()> {
    setup_logging();

    let args = Args::parse();
    let file_config = match args.config_path {
        Some(ref path) => ScenarioConfig::load(path)?,
        None => ScenarioConfig::default(),
    };

    let client = Client::new(Duration::from_millis(args.call_timeout))?;

    match args.command {
        Command::Send(send) => cmd_send(client, &file_config, send),
        Command::Run(run) => cmd_run(client, &file_config, run),
        Command::Close { ids } => {
            for id in ids {
                client.close_notification(id)?;
                println!("Closed {}", id);
            }
            Ok(())
        }
        Command::Listen => {
            let (tx, rx) = channel();
            client.subscribe(tx).require(true)?;
            info!("Waiting for signals");
            NotifyEventLoop::run(client, None, rx)?;
            Ok(())
        }
        Command::Info => {
            println!("{}", client.get_server_information()?);
            println!("Capabilities: {}", client.get_capabilities()?.join(", "));
            Ok(())
        }
        Command::Infoprint { message } => {
            println!("{}", client.system_note_infoprint(&message)?);
            Ok(())
        }
        Command::Dialog { message, kind, label } => {
            println!("{}", client.system_note_dialog(&message, kind, &label)?);
            Ok(())
        }
        Command::History => {
            let scenario = Scenario::resolve(Preset::Email, &[&file_config]);
            let now = chrono::Local::now().timestamp();
            emitter::send_history(&client, &scenario, now)?;
            Ok(())
        }
    }
}

fn cmd_send(client: Client, file_config: &ScenarioConfig, send: SendArgs) -> Result<()> {
    let cli_config = send.scenario.to_config();
    let scenario = Scenario::resolve(Preset::Email, &[file_config, &cli_config]);

    // Subscribe first so nothing sent in between is missed
    let (tx, rx) = channel();
    if send.listen {
        client.subscribe(tx).require(true)?;
    }

    let mut emitter = Emitter::new(scenario);
    let now = chrono::Local::now().timestamp();
    for _ in 0..send.count {
        emitter.emit(&client, now)?;
    }

    if send.listen {
        NotifyEventLoop::run(client, None, rx)?;
    }
    Ok(())
}

fn cmd_run(client: Client, file_config: &ScenarioConfig, run: RunArgs) -> Result<()> {
    let cli_config = run.to_config();
    let scenario = Scenario::resolve(Preset::Email, &[file_config, &cli_config]);
    info!(
        "Running '{}' ({}), close after: {:?}",
        scenario.app_name, scenario.category, scenario.close_after
    );

    let (tx, rx) = channel();
    if !run.no_signals {
        client.subscribe(tx).require(run.require_signals)?;
    }

    if let Some(em) = NotifyEventLoop::run(client, Some(Emitter::new(scenario)), rx)? {
        info!("Sent {} notifications, closed {}", em.counter(), em.emitted().len());
    }
    Ok(())
}

fn setup_logging() {
    #[cfg(debug_assertions)]
    let default_level = "trace";
    #[cfg(not(debug_assertions))]
    let default_level = "info";

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format(|buf, record| {
            let style = buf.default_level_style(record.level());

            writeln!(
                buf,
                "{} [{}] {}",
                chrono::Local::now().format("%F %T%.3f"),
                style.value(record.level()),
                record.args()
            )
        })
        .init();
}
