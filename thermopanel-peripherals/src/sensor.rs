use std::fmt::{Display, Formatter};
use std::sync::{mpsc, Mutex};
use std::thread::sleep;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::spawn_blocking;
use tokio::time::{Duration, Instant};

mod w1;

pub use w1::{parse_w1_slave, SensorError, W1Sensor, W1_DEVICES_DIR};

pub const READ_RATE: Duration = Duration::from_secs(2);

#[derive(Clone, Debug, PartialEq)]
pub struct Reading {
    pub temperature: Option<f64>,
}

impl Display for Reading {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.temperature {
            Some(t) => write!(f, "{}°C", t),
            None => write!(f, "-"),
        }
    }
}

impl Reading {
    pub fn empty() -> Reading {
        Reading { temperature: None }
    }
}

#[derive(Clone, Debug)]
pub enum ReaderMessage {
    Start,
    Pause,
    Stop,
}

#[derive(Error, Clone, Debug)]
pub enum ThermometerError {
    #[error(transparent)]
    Sensor(#[from] SensorError),
    #[error("Could not communicate with sensor thread")]
    Send,
    #[error("Could not acquire message sender mutex")]
    Mutex,
}

pub type Result<T> = std::result::Result<T, ThermometerError>;

/// Periodically reads a [`W1Sensor`] on a blocking thread and publishes the
/// readings to every subscriber.
#[derive(Debug)]
pub struct Thermometer {
    reading_receiver: watch::Receiver<Result<Reading>>,
    message_sender: Mutex<mpsc::Sender<ReaderMessage>>,
}

impl Thermometer {
    pub fn start(sensor: W1Sensor, rate: Duration) -> Thermometer {
        let (message_sender, message_receiver) = mpsc::channel();
        let reading_receiver = Self::start_reading(sensor, rate, message_receiver);

        Thermometer {
            reading_receiver,
            message_sender: Mutex::new(message_sender),
        }
    }

    pub fn default_device() -> Result<Self> {
        Ok(Self::start(W1Sensor::default_device()?, READ_RATE))
    }

    fn start_reading(
        sensor: W1Sensor,
        rate: Duration,
        message_receiver: mpsc::Receiver<ReaderMessage>,
    ) -> watch::Receiver<Result<Reading>> {
        let (reading_sender, reading_receiver) = watch::channel(Ok(Reading::empty()));

        spawn_blocking(move || {
            info!("starting sensor thread for {:?}", sensor.path());
            let mut running = true;
            let mut next_tick = Instant::now() + rate;
            loop {
                let now = Instant::now();
                if now < next_tick {
                    trace!("sleeping {:?}", next_tick - now);
                    sleep(next_tick - now);
                } else {
                    info!("next tick already surpassed, sensor reads are slower than the read rate");
                }
                next_tick += rate;

                loop {
                    match message_receiver.try_recv() {
                        Ok(ReaderMessage::Stop) => {
                            info!("sensor thread received stop signal");
                            return;
                        }
                        Err(mpsc::TryRecvError::Empty) => break,
                        Err(mpsc::TryRecvError::Disconnected) => {
                            info!("sensor message sender closed before stop signal");
                            return;
                        }
                        Ok(ReaderMessage::Pause) => {
                            info!("sensor thread pausing");
                            running = false
                        }
                        Ok(ReaderMessage::Start) => {
                            info!("sensor thread starting");
                            running = true
                        }
                    }
                }

                if reading_sender.receiver_count() <= 1 {
                    trace!("skipping due to no reading receivers");
                    continue;
                }

                let reading = if running {
                    sensor
                        .read()
                        .map(|t| Reading {
                            temperature: Some(t),
                        })
                        .map_err(ThermometerError::from)
                } else {
                    trace!("skip reading");
                    Ok(Reading::empty())
                };

                if reading_sender.send(reading).is_err() {
                    info!("sent to no reading receivers");
                }
            }
        });

        reading_receiver
    }

    pub fn subscribe(&self) -> watch::Receiver<Result<Reading>> {
        self.reading_receiver.clone()
    }

    fn send(&self, msg: ReaderMessage) -> Result<()> {
        self.message_sender
            .lock()
            .map_err(|_| ThermometerError::Mutex)?
            .send(msg)
            .map_err(|_| ThermometerError::Send)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(ReaderMessage::Pause)
    }

    pub fn restart(&self) -> Result<()> {
        self.send(ReaderMessage::Start)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(ReaderMessage::Stop)
    }
}
