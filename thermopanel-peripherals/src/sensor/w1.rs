use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

pub const W1_DEVICES_DIR: &str = "/sys/bus/w1/devices";

/// DS18B20 family code, every device directory for one starts with it
const DS18B20_PREFIX: &str = "28-";

const SLAVE_FILE: &str = "w1_slave";

#[derive(Error, Clone, Debug)]
pub enum SensorError {
    #[error("Could not read sensor file {0:?}")]
    Read(PathBuf, #[source] Arc<io::Error>),
    #[error("No DS18B20 sensor found under {0:?}")]
    NotFound(PathBuf),
    #[error("Sensor reported a crc mismatch")]
    Crc,
    #[error("Sensor output was malformed: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, SensorError>;

/// Parses the two line output of the `w1_therm` driver, eg.
///
/// ```text
/// 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
/// 72 01 4b 46 7f ff 0e 10 57 t=23125
/// ```
///
/// into degrees celsius. One-line files holding just the millidegrees, like
/// the driver's `temperature` attribute or a `thermal_zone*/temp`, are read
/// as they are.
pub fn parse_w1_slave(contents: &str) -> Result<f64> {
    let lines: Vec<&str> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let (status, data) = match lines.as_slice() {
        [] => return Err(SensorError::Malformed(String::from("empty output"))),
        [value] => return parse_millidegrees(value),
        [status, data, ..] => (*status, *data),
    };
    if !status.ends_with("YES") {
        return Err(SensorError::Crc);
    }
    let (_, raw) = data
        .rsplit_once("t=")
        .ok_or_else(|| SensorError::Malformed(format!("no temperature in {:?}", data)))?;
    parse_millidegrees(raw)
}

fn parse_millidegrees(raw: &str) -> Result<f64> {
    let millis: i32 = raw
        .trim()
        .parse()
        .map_err(|_| SensorError::Malformed(format!("bad temperature value {:?}", raw)))?;
    Ok(f64::from(millis) / 1000.0)
}

#[derive(Clone, Debug)]
pub struct W1Sensor {
    path: PathBuf,
}

impl W1Sensor {
    /// `path` is the `w1_slave` file itself
    pub fn new<P: Into<PathBuf>>(path: P) -> W1Sensor {
        W1Sensor { path: path.into() }
    }

    /// Uses the first DS18B20 found in `devices_dir`.
    pub fn discover<P: AsRef<Path>>(devices_dir: P) -> Result<W1Sensor> {
        let devices_dir = devices_dir.as_ref();
        let entries = fs::read_dir(devices_dir)
            .map_err(|e| SensorError::Read(devices_dir.to_path_buf(), Arc::new(e)))?;
        let mut devices: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map_or(false, |name| name.starts_with(DS18B20_PREFIX))
            })
            .map(|entry| entry.path())
            .collect();
        devices.sort();
        let device = devices
            .into_iter()
            .next()
            .ok_or_else(|| SensorError::NotFound(devices_dir.to_path_buf()))?;
        debug!("found w1 device at {:?}", device);
        Ok(Self::new(device.join(SLAVE_FILE)))
    }

    pub fn default_device() -> Result<W1Sensor> {
        Self::discover(W1_DEVICES_DIR)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocking read of the sensor file, the driver takes most of a second to answer.
    pub fn read(&self) -> Result<f64> {
        trace!("reading w1 sensor at {:?}", self.path);
        let contents = fs::read_to_string(&self.path)
            .map_err(|e| SensorError::Read(self.path.clone(), Arc::new(e)))?;
        parse_w1_slave(&contents)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    const GOOD: &str = "72 01 4b 46 7f ff 0e 10 57 : crc=57 YES\n\
                        72 01 4b 46 7f ff 0e 10 57 t=23125\n";

    #[test]
    fn parses_reading() {
        assert_eq!(parse_w1_slave(GOOD).unwrap(), 23.125);
    }

    #[test]
    fn parses_negative_reading() {
        let out = "ff ff 4b 46 7f ff 0e 10 57 : crc=57 YES\nff ff 4b 46 7f ff 0e 10 57 t=-1250\n";
        assert_eq!(parse_w1_slave(out).unwrap(), -1.25);
    }

    #[test]
    fn parses_single_line_value() {
        assert_eq!(parse_w1_slave("23125\n").unwrap(), 23.125);
        assert_eq!(parse_w1_slave("-500").unwrap(), -0.5);
        assert!(matches!(
            parse_w1_slave("warm\n"),
            Err(SensorError::Malformed(_))
        ));
    }

    #[test]
    fn reads_temperature_attribute() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"19875\n").unwrap();
        assert_eq!(W1Sensor::new(file.path()).read().unwrap(), 19.875);
    }

    #[test]
    fn rejects_crc_mismatch() {
        let out = "72 01 4b 46 7f ff 0e 10 57 : crc=57 NO\n72 01 4b 46 7f ff 0e 10 57 t=23125\n";
        assert!(matches!(parse_w1_slave(out), Err(SensorError::Crc)));
    }

    #[test]
    fn rejects_missing_value() {
        let out = "72 01 4b 46 7f ff 0e 10 57 : crc=57 YES\n72 01 4b 46 7f ff 0e 10 57\n";
        assert!(matches!(
            parse_w1_slave(out),
            Err(SensorError::Malformed(_))
        ));
        assert!(matches!(parse_w1_slave(""), Err(SensorError::Malformed(_))));
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(GOOD.as_bytes()).unwrap();
        let sensor = W1Sensor::new(file.path());
        assert_eq!(sensor.read().unwrap(), 23.125);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let sensor = W1Sensor::new(dir.path().join("nope"));
        assert!(matches!(sensor.read(), Err(SensorError::Read(_, _))));
    }

    #[test]
    fn discovers_first_ds18b20() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("w1_bus_master1")).unwrap();
        fs::create_dir(dir.path().join("28-0000000b")).unwrap();
        fs::create_dir(dir.path().join("28-0000000a")).unwrap();
        let sensor = W1Sensor::discover(dir.path()).unwrap();
        assert_eq!(
            sensor.path(),
            dir.path().join("28-0000000a").join(SLAVE_FILE)
        );
    }

    #[test]
    fn discover_without_devices_fails() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("w1_bus_master1")).unwrap();
        assert!(matches!(
            W1Sensor::discover(dir.path()),
            Err(SensorError::NotFound(_))
        ));
    }
}
