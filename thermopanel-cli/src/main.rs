mod remote;

extern crate pretty_env_logger;
#[macro_use]
extern crate log;

use crate::remote::TemperatureOpt;
use eyre::WrapErr;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;
use structopt::StructOpt;
use thermopanel_api::client::ThermostatClient;
use thermopanel_api::server::{self, ThermostatState};
use thermopanel_api::types::FanSpeed;
use thermopanel_peripherals::lcd::{Lcd, LcdPins};
use thermopanel_peripherals::sensor::{Thermometer, W1Sensor, READ_RATE};

#[derive(StructOpt, Debug)]
struct InitialState {
    #[structopt(short, long, default_value = "20")]
    temperature: f64,
    #[structopt(short, long, default_value = "medium")]
    fan_speed: String,
    #[structopt(short, long, default_value = "Off")]
    ac_status: String,
}

impl From<InitialState> for ThermostatState {
    fn from(
        InitialState {
            temperature,
            fan_speed,
            ac_status,
        }: InitialState,
    ) -> Self {
        ThermostatState {
            temperature,
            fan_speed,
            ac_status,
        }
    }
}

#[derive(StructOpt, Debug)]
enum Command {
    /// Show temperature, fan speed and AC status
    Status,
    Temperature(TemperatureOpt),
    Fan {
        /// low, medium or high
        speed: FanSpeed,
    },
    /// Switch the AC to the opposite of what the server reports
    ToggleAc,
    Sensor {
        /// w1_slave file, the first DS18B20 on the bus if omitted
        #[structopt(short, long, env = "THERMOPANEL_SENSOR")]
        path: Option<PathBuf>,

        /// Number of readings
        #[structopt(short, long, default_value = "1")]
        times: usize,
    },
    Lcd {
        /// Text to display
        text: String,

        /// Duration of display in seconds
        #[structopt(short, long)]
        duration: u64,

        /// Pins as rs,e,d4,d5,d6,d7 (BCM numbering)
        #[structopt(long, env = "THERMOPANEL_LCD_PINS", default_value = "7,8,25,24,23,18")]
        pins: LcdPins,
    },
    /// Run an in-memory thermostat api
    Serve {
        /// Address for server
        #[structopt(long, default_value = "127.0.0.1:5000")]
        addr: SocketAddr,

        #[structopt(flatten)]
        initial_state: InitialState,
    },
}

#[derive(StructOpt, Debug)]
#[structopt(name = "thermopanel")]
struct Opt {
    /// Base url of the thermostat api
    #[structopt(short, long, env = "THERMOPANEL_SERVER", default_value = "http://127.0.0.1:5000")]
    server: String,

    #[structopt(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    color_eyre::install()?;

    let opts = Opt::from_args();

    debug!("opts: {:?}", opts);

    let client = || ThermostatClient::new(opts.server.clone());

    match opts.command {
        Command::Status => remote::status(&client()?).await?,
        Command::Temperature(temperature_opts) => {
            remote::temperature(&client()?, temperature_opts).await?
        }
        Command::Fan { speed } => remote::fan(&client()?, speed).await?,
        Command::ToggleAc => remote::toggle_ac(&client()?).await?,
        Command::Sensor { path, times } => {
            let thermometer = match path {
                Some(path) => Thermometer::start(W1Sensor::new(path), READ_RATE),
                None => Thermometer::default_device()?,
            };
            let mut receiver = thermometer.subscribe();
            for _ in 0..times {
                receiver.changed().await?;
                let reading = receiver.borrow_and_update().clone();
                println!("Sensor reading: {}", reading?);
            }
            thermometer.stop()?;
        }
        Command::Lcd {
            text,
            duration,
            pins,
        } => {
            let mut lcd = Lcd::new(pins)?;
            println!("Displaying text: {}", text);
            lcd.push_str(&text)?;
            lcd.wait_for_processing().await?;
            sleep(Duration::from_secs(duration));
            println!("Clearing lcd");
            lcd.shutdown().await?;
        }
        Command::Serve {
            addr,
            initial_state,
        } => {
            println!("Starting server at {}", addr);
            server::serve(addr, server::shared(initial_state.into()))
                .await
                .wrap_err("Server stopped")?;
        }
    }

    Ok(())
}
