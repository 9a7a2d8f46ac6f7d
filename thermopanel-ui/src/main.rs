#![forbid(unsafe_code)]
#![warn(clippy::all, rust_2018_idioms)]

extern crate pretty_env_logger;
#[macro_use]
extern crate log;

use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use eyre::{eyre, WrapErr};
use structopt::StructOpt;
use thermopanel_api::client::ThermostatClient;
use thermopanel_peripherals::lcd::{Lcd, LcdPins};
use thermopanel_peripherals::sensor::W1Sensor;
use thermopanel_ui::worker::{ClientMessage, Worker};
use thermopanel_ui::ThermostatApp;
use tokio::sync::mpsc as async_mpsc;

fn parse_interval(src: &str) -> Result<u64, String> {
    match src.parse::<u64>() {
        Ok(0) => Err(String::from("interval must be at least 1 millisecond")),
        Ok(ms) => Ok(ms),
        Err(e) => Err(e.to_string()),
    }
}

#[derive(StructOpt, Debug)]
#[structopt(name = "thermopanel-ui", about = "Thermostat control panel")]
struct Opt {
    /// Base url of the thermostat api
    #[structopt(short, long, env = "THERMOPANEL_SERVER", default_value = "http://127.0.0.1:5000")]
    server: String,

    /// Refresh interval in milliseconds
    #[structopt(short, long, env = "THERMOPANEL_INTERVAL_MS", default_value = "2000", parse(try_from_str = parse_interval))]
    interval: u64,

    /// Push readings from this w1_slave file to the server before each refresh
    #[structopt(long, env = "THERMOPANEL_SENSOR")]
    sensor: Option<PathBuf>,

    /// Use the first DS18B20 on the 1-Wire bus as the sensor
    #[structopt(long, conflicts_with = "sensor")]
    discover_sensor: bool,

    /// Mirror the panel on a character lcd
    #[structopt(long)]
    lcd: bool,

    /// Lcd pins as rs,e,d4,d5,d6,d7 (BCM numbering)
    #[structopt(long, env = "THERMOPANEL_LCD_PINS", default_value = "7,8,25,24,23,18")]
    lcd_pins: LcdPins,
}

fn main() -> eyre::Result<()> {
    pretty_env_logger::init();
    color_eyre::install()?;

    let opts = Opt::from_args();

    debug!("opts: {:?}", opts);

    let runtime = tokio::runtime::Runtime::new().wrap_err("Could not start tokio runtime")?;
    let client = ThermostatClient::new(opts.server.clone())?;
    let sensor = if opts.discover_sensor {
        Some(W1Sensor::default_device()?)
    } else {
        opts.sensor.clone().map(W1Sensor::new)
    };

    let (event_sender, event_receiver) = mpsc::channel();
    let (client_message_sender, client_message_receiver) = async_mpsc::unbounded_channel();

    let mut worker = Worker::new(
        client,
        event_sender,
        Duration::from_millis(opts.interval),
    );
    if let Some(sensor) = sensor {
        info!("reading sensor at {:?}", sensor.path());
        worker = worker.with_sensor(sensor);
    }
    if opts.lcd {
        // the lcd thread has to be spawned from inside the runtime
        let lcd = runtime.block_on(async { Lcd::new(opts.lcd_pins) })?;
        worker = worker.with_lcd(lcd);
    }
    let worker_handle = runtime.spawn(worker.run(client_message_receiver));

    let app = ThermostatApp::new(event_receiver, client_message_sender.clone());
    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_title("Thermostat")
            .with_inner_size([360.0, 220.0]),
        ..Default::default()
    };
    let res = eframe::run_native(
        "Thermostat",
        native_options,
        Box::new(
            |_cc: &eframe::CreationContext<'_>| -> Box<dyn eframe::App> { Box::new(app) },
        ),
    );

    if client_message_sender.send(ClientMessage::Stop).is_err() {
        debug!("worker already stopped");
    }
    runtime
        .block_on(worker_handle)
        .wrap_err("Client worker panicked")?;
    res.map_err(|e| eyre!("Could not run the control panel: {}", e))
}
