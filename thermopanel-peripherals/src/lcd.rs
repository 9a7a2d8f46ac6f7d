use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::{sync::mpsc, thread::sleep, time::Duration};

use crate::GpioError;
use rppal::gpio::{Gpio, OutputPin};
use thiserror::Error;
use tokio::{
    sync::{oneshot, watch},
    task::{spawn_blocking, JoinHandle},
};

pub const COLUMNS: u8 = 16;

const FIRST_LINE: u8 = 0x80;
const SECOND_LINE: u8 = 0xc0;
const DEGREE_GLYPH: u8 = 0xdf;

const ENABLE_PULSE: Duration = Duration::from_micros(500);

/// Register select, low for instructions and high for character data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Command,
    Data,
}

pub trait LcdBus: Send + 'static {
    fn write(&mut self, mode: Mode, byte: u8);
}

/// BCM numbers of the pins wired to the lcd
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LcdPins {
    pub rs: u8,
    pub enable: u8,
    pub data: [u8; 4],
}

impl Default for LcdPins {
    fn default() -> Self {
        LcdPins {
            rs: 7,
            enable: 8,
            data: [25, 24, 23, 18],
        }
    }
}

#[derive(Error, Debug)]
#[error("Expected six comma separated pin numbers: rs,e,d4,d5,d6,d7")]
pub struct ParseLcdPinsError {}

impl FromStr for LcdPins {
    type Err = ParseLcdPinsError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let pins = s
            .split(',')
            .map(|p| p.trim().parse::<u8>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| ParseLcdPinsError {})?;
        match pins.as_slice() {
            [rs, enable, d4, d5, d6, d7] => Ok(LcdPins {
                rs: *rs,
                enable: *enable,
                data: [*d4, *d5, *d6, *d7],
            }),
            _ => Err(ParseLcdPinsError {}),
        }
    }
}

impl Display for LcdPins {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let [d4, d5, d6, d7] = self.data;
        write!(f, "{},{},{},{},{},{}", self.rs, self.enable, d4, d5, d6, d7)
    }
}

/// HD44780 driven in 4-bit mode, each byte goes out as two nibbles high first
pub struct GpioBus {
    rs: OutputPin,
    enable: OutputPin,
    data: [OutputPin; 4],
}

impl GpioBus {
    pub fn new(pins: LcdPins) -> Result<GpioBus> {
        let gpio = Gpio::new().map_err(|_| GpioError::Initialization)?;
        let output = |pin: u8| -> Result<OutputPin> {
            Ok(gpio
                .get(pin)
                .map_err(|_| GpioError::Pin(pin))?
                .into_output())
        };
        let [d4, d5, d6, d7] = pins.data;
        Ok(GpioBus {
            rs: output(pins.rs)?,
            enable: output(pins.enable)?,
            data: [output(d4)?, output(d5)?, output(d6)?, output(d7)?],
        })
    }

    fn write_nibble(&mut self, nibble: u8) {
        for (bit, pin) in self.data.iter_mut().enumerate() {
            if nibble & (1 << bit) != 0 {
                pin.set_high();
            } else {
                pin.set_low();
            }
        }
        sleep(ENABLE_PULSE);
        self.enable.set_high();
        sleep(ENABLE_PULSE);
        self.enable.set_low();
        sleep(ENABLE_PULSE);
    }
}

impl LcdBus for GpioBus {
    fn write(&mut self, mode: Mode, byte: u8) {
        match mode {
            Mode::Command => self.rs.set_low(),
            Mode::Data => self.rs.set_high(),
        }
        self.write_nibble(byte >> 4);
        self.write_nibble(byte & 0x0f);
    }
}

#[derive(Debug)]
enum LcdMessage {
    Char(u8),
    Cmd(u8),
    Wait(Duration),
    Flush(oneshot::Sender<()>),
    Stop,
}

#[derive(Error, Clone, Debug)]
pub enum LcdError {
    #[error(transparent)]
    Gpio(#[from] GpioError),
    #[error("Could not send message to lcd thread")]
    Send,
    #[error("Could not wait for lcd thread to stop")]
    ThreadWait,
    #[error("Could not wait for processing notification")]
    ProcessingWait,
}

pub type Result<T> = std::result::Result<T, LcdError>;

/// Maps a char onto the lcd's character rom, which only matches ascii
pub fn glyph(c: char) -> u8 {
    match c {
        '°' => DEGREE_GLYPH,
        c if c.is_ascii() && !c.is_ascii_control() => c as u8,
        _ => b'?',
    }
}

#[derive(Debug)]
pub struct Lcd {
    col: u8,
    row: u8,
    write_handle: JoinHandle<()>,
    write_sender: mpsc::Sender<LcdMessage>,
    processing_receiver: watch::Receiver<bool>,
}

impl Lcd {
    const INIT_SEQ: [LcdMessage; 7] = [
        LcdMessage::Cmd(0x33),
        LcdMessage::Cmd(0x32),
        LcdMessage::Cmd(0x28),
        LcdMessage::Cmd(0x0c),
        LcdMessage::Cmd(0x06),
        LcdMessage::Cmd(0x01),
        LcdMessage::Wait(Duration::from_millis(2)),
    ];

    pub fn new(pins: LcdPins) -> Result<Lcd> {
        Self::with_bus(GpioBus::new(pins)?)
    }

    pub fn default_pins() -> Result<Self> {
        Self::new(LcdPins::default())
    }

    pub fn with_bus<B: LcdBus>(mut bus: B) -> Result<Lcd> {
        let (write_sender, write_receiver) = mpsc::channel();
        let (processing_sender, processing_receiver) = watch::channel(false);
        let write_handle = spawn_blocking(move || {
            info!("starting lcd messaging thread");
            loop {
                let next_msg = match write_receiver.try_recv() {
                    Ok(msg) => {
                        trace!("next message was already queued");
                        msg
                    }
                    Err(e) => {
                        trace!("no message queued");
                        // notify if no message in queue
                        if let Err(e) = processing_sender.send(false) {
                            error!("error in lcd messaging thread while trying to set processing status to false: {}", e);
                            break;
                        }
                        match e {
                            mpsc::TryRecvError::Disconnected => {
                                info!("lcd messaging channel disconnected");
                                break;
                            }
                            mpsc::TryRecvError::Empty => match write_receiver.recv() {
                                Ok(msg) => msg,
                                Err(_) => {
                                    info!("lcd messaging channel had no more messages");
                                    break;
                                }
                            },
                        }
                    }
                };
                if let Err(e) = processing_sender.send(true) {
                    error!("error in lcd messaging thread while trying to set processing status to true: {}", e);
                    break;
                }
                match next_msg {
                    LcdMessage::Char(c) => {
                        trace!("writing char {} to lcd", c);
                        bus.write(Mode::Data, c);
                    }
                    LcdMessage::Cmd(cmd) => {
                        trace!("writing cmd {:#04x} to lcd", cmd);
                        bus.write(Mode::Command, cmd);
                    }
                    LcdMessage::Wait(duration) => {
                        trace!("sleeping lcd messaging thread for {:?}", duration);
                        sleep(duration)
                    }
                    LcdMessage::Flush(done) => {
                        trace!("lcd queue flushed");
                        let _ = done.send(());
                    }
                    LcdMessage::Stop => {
                        trace!("stopping lcd messaging thread");
                        break;
                    }
                };
            }
            info!("lcd messaging thread stopping");
        });
        let mut lcd = Lcd {
            col: 0,
            row: 1,
            write_handle,
            write_sender,
            processing_receiver,
        };
        lcd.init()?;
        Ok(lcd)
    }

    fn send(&self, msg: LcdMessage) -> Result<()> {
        self.write_sender.send(msg).map_err(|_| LcdError::Send)
    }

    pub fn init(&mut self) -> Result<()> {
        trace!("initializing lcd");
        self.col = 0;
        self.row = 1;
        IntoIterator::into_iter(Lcd::INIT_SEQ).try_for_each(|msg| self.send(msg))
    }

    pub fn clear(&mut self) -> Result<()> {
        trace!("clearing lcd");
        self.col = 0;
        self.row = 1;
        self.send(LcdMessage::Cmd(0x01))?;
        self.send(LcdMessage::Wait(Duration::from_millis(2)))
    }

    pub fn first_line_head(&mut self) -> Result<()> {
        trace!("moving to head of first line of lcd");
        self.col = 0;
        self.row = 1;
        self.send(LcdMessage::Cmd(FIRST_LINE))
    }

    pub fn second_line_head(&mut self) -> Result<()> {
        trace!("moving to head of second line of lcd");
        self.col = 0;
        self.row = 2;
        self.send(LcdMessage::Cmd(SECOND_LINE))
    }

    /// Writes one raw character code, wrapping onto the other line when the
    /// current one is full
    pub fn push_char(&mut self, char: u8) -> Result<()> {
        trace!("pushing char {} to lcd messaging thread", char);
        if self.col >= COLUMNS {
            if self.row == 2 {
                trace!("at end of second line of lcd");
                self.first_line_head()?;
            } else {
                trace!("at end of first line of lcd");
                self.second_line_head()?;
            }
        }
        self.col += 1;
        self.send(LcdMessage::Char(char))?;
        self.send(LcdMessage::Wait(Duration::from_micros(50)))
    }

    pub fn push_str(&mut self, s: &str) -> Result<()> {
        s.chars().try_for_each(|c| self.push_char(glyph(c)))
    }

    /// Replaces the whole display, each line is cut to the display width
    pub fn write_lines(&mut self, first: &str, second: &str) -> Result<()> {
        self.clear()?;
        self.first_line_head()?;
        first
            .chars()
            .take(COLUMNS as usize)
            .try_for_each(|c| self.push_char(glyph(c)))?;
        self.second_line_head()?;
        second
            .chars()
            .take(COLUMNS as usize)
            .try_for_each(|c| self.push_char(glyph(c)))
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        trace!("shutting down lcd");
        self.clear()?;
        self.send(LcdMessage::Stop)?;
        (&mut self.write_handle)
            .await
            .map_err(|_| LcdError::ThreadWait)?;
        Ok(())
    }

    pub fn is_write_processing(&self) -> bool {
        *self.processing_receiver.borrow()
    }

    /// Resolves once everything queued before the call has reached the bus
    pub async fn wait_for_processing(&mut self) -> Result<()> {
        let (done_sender, done_receiver) = oneshot::channel();
        self.send(LcdMessage::Flush(done_sender))?;
        done_receiver.await.map_err(|_| LcdError::ProcessingWait)
    }
}
