use std::sync::{mpsc, Arc};
use std::time::Duration;

use thermopanel_api::client::ThermostatClient;
use thermopanel_api::types::{format_temperature, AcStatus, FanSpeed, Snapshot};
use thermopanel_peripherals::lcd::Lcd;
use thermopanel_peripherals::sensor::W1Sensor;
use tokio::sync::{mpsc as async_mpsc, Mutex};
use tokio::task::spawn_blocking;
use tokio::time::{interval, MissedTickBehavior};

use crate::panel::PanelEvent;

pub const REFRESH_INTERVAL: Duration = Duration::from_millis(2000);

/// Requests from the window to the worker
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Refresh,
    UpdateTemperature(f64),
    SetFanSpeed(FanSpeed),
    ToggleAc(AcStatus),
    Stop,
}

/// What the lcd shows for a snapshot
pub fn lcd_lines(snapshot: &Snapshot) -> (String, String) {
    (
        format!("Temp {}°C", format_temperature(snapshot.temperature)),
        format!("{} AC {}", snapshot.fan_speed, snapshot.ac_status),
    )
}

/// Talks to the server on behalf of the window. Every request runs in its
/// own task and nothing waits on it, failures only show up in the log.
pub struct Worker {
    client: ThermostatClient,
    events: mpsc::Sender<PanelEvent>,
    interval: Duration,
    sensor: Option<W1Sensor>,
    lcd: Option<Arc<Mutex<Lcd>>>,
}

impl Worker {
    pub fn new(
        client: ThermostatClient,
        events: mpsc::Sender<PanelEvent>,
        interval: Duration,
    ) -> Worker {
        Worker {
            client,
            events,
            interval,
            sensor: None,
            lcd: None,
        }
    }

    /// Push the sensor's reading to the server before every refresh
    pub fn with_sensor(mut self, sensor: W1Sensor) -> Worker {
        self.sensor = Some(sensor);
        self
    }

    /// Mirror every refresh on the lcd
    pub fn with_lcd(mut self, lcd: Lcd) -> Worker {
        self.lcd = Some(Arc::new(Mutex::new(lcd)));
        self
    }

    pub async fn run(self, mut messages: async_mpsc::UnboundedReceiver<ClientMessage>) {
        info!(
            "polling {} every {:?}",
            self.client.endpoint(),
            self.interval
        );
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.refresh(),
                msg = messages.recv() => match msg {
                    Some(ClientMessage::Refresh) => self.refresh(),
                    Some(ClientMessage::UpdateTemperature(temperature)) => {
                        self.update_temperature(temperature)
                    }
                    Some(ClientMessage::SetFanSpeed(speed)) => self.set_fan_speed(speed),
                    Some(ClientMessage::ToggleAc(status)) => self.toggle_ac(status),
                    Some(ClientMessage::Stop) | None => break,
                },
            }
        }
        debug!("worker stopping");
        if let Some(lcd) = self.lcd {
            if let Err(e) = lcd.lock().await.shutdown().await {
                error!("could not shut down lcd: {}", e);
            }
        }
    }

    fn refresh_task(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let client = self.client.clone();
        let events = self.events.clone();
        let sensor = self.sensor.clone();
        let lcd = self.lcd.clone();
        async move {
            if let Some(sensor) = sensor {
                push_sensor_reading(&client, sensor).await;
            }
            let snapshot = client.snapshot().await;
            trace!("refreshed: {:?}", snapshot);
            if let Some(lcd) = lcd {
                let mut lcd = lcd.lock().await;
                if lcd.is_write_processing() {
                    debug!("lcd still busy, skipping update");
                } else {
                    let (first, second) = lcd_lines(&snapshot);
                    if let Err(e) = lcd.write_lines(&first, &second) {
                        error!("could not write to lcd: {}", e);
                    }
                }
            }
            let Snapshot {
                temperature,
                fan_speed,
                ac_status,
            } = snapshot;
            for event in [
                PanelEvent::Temperature(temperature),
                PanelEvent::FanSpeed(fan_speed),
                PanelEvent::AcStatus(ac_status),
            ] {
                if events.send(event).is_err() {
                    debug!("panel gone, dropping refresh");
                    break;
                }
            }
        }
    }

    fn refresh(&self) {
        tokio::spawn(self.refresh_task());
    }

    fn update_temperature(&self, temperature: f64) {
        let client = self.client.clone();
        let refresh = self.refresh_task();
        tokio::spawn(async move {
            if let Err(e) = client.update_temperature(temperature).await {
                warn!("could not update temperature: {}", e);
            }
            refresh.await;
        });
    }

    fn set_fan_speed(&self, speed: FanSpeed) {
        let client = self.client.clone();
        let refresh = self.refresh_task();
        tokio::spawn(async move {
            if let Err(e) = client.set_fan_speed(speed.as_ref()).await {
                warn!("could not set fan speed: {}", e);
            }
            refresh.await;
        });
    }

    /// The label was already flipped by the window, no refresh follows
    fn toggle_ac(&self, status: AcStatus) {
        let client = self.client.clone();
        tokio::spawn(async move {
            match client.toggle_ac(status).await {
                Ok(ack) => debug!("server reports ac {}", ack.ac_status),
                Err(e) => warn!("could not toggle ac: {}", e),
            }
        });
    }
}

/// A failed read skips the update for this cycle
async fn push_sensor_reading(client: &ThermostatClient, sensor: W1Sensor) {
    let reading = match spawn_blocking(move || sensor.read()).await {
        Ok(Ok(t)) => t,
        Ok(Err(e)) => {
            warn!("skipping sensor update: {}", e);
            return;
        }
        Err(e) => {
            error!("sensor read task failed: {}", e);
            return;
        }
    };
    debug!("sensor reads {}°C", reading);
    if let Err(e) = client.update_temperature(reading).await {
        warn!("could not push sensor reading: {}", e);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;
    use thermopanel_api::server::{self, SharedState, ThermostatState};
    use tokio::net::TcpListener;

    const LONG: Duration = Duration::from_secs(3600);

    async fn start_server() -> (SharedState, ThermostatClient) {
        let state = server::shared(ThermostatState::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = server::router(state.clone());
        tokio::spawn(async move { axum_serve(listener, router).await });
        (
            state,
            ThermostatClient::new(format!("http://{}", addr)).unwrap(),
        )
    }

    async fn axum_serve(listener: TcpListener, router: axum::Router) {
        axum::serve(listener, router).await.unwrap();
    }

    fn start_worker(
        worker: Worker,
    ) -> (
        async_mpsc::UnboundedSender<ClientMessage>,
        tokio::task::JoinHandle<()>,
    ) {
        let (sender, receiver) = async_mpsc::unbounded_channel();
        let handle = tokio::spawn(worker.run(receiver));
        (sender, handle)
    }

    /// Blocks until an event matching `f` arrives
    fn wait_for(events: &mpsc::Receiver<PanelEvent>, f: impl Fn(&PanelEvent) -> bool) {
        loop {
            let event = events
                .recv_timeout(Duration::from_secs(5))
                .expect("no matching panel event");
            if f(&event) {
                return;
            }
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn refreshes_on_start() {
        let (_state, client) = start_server().await;
        let (events_sender, events) = mpsc::channel();
        let (sender, handle) = start_worker(Worker::new(client, events_sender, LONG));

        wait_for(&events, |e| *e == PanelEvent::Temperature(20.0));
        wait_for(&events, |e| *e == PanelEvent::FanSpeed(String::from("medium")));
        wait_for(&events, |e| *e == PanelEvent::AcStatus(String::from("Off")));

        sender.send(ClientMessage::Stop).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn updates_then_refreshes() {
        let (state, client) = start_server().await;
        let (events_sender, events) = mpsc::channel();
        let (sender, handle) = start_worker(Worker::new(client, events_sender, LONG));

        sender.send(ClientMessage::UpdateTemperature(24.0)).unwrap();
        wait_for(&events, |e| *e == PanelEvent::Temperature(24.0));
        sender
            .send(ClientMessage::SetFanSpeed(FanSpeed::Low))
            .unwrap();
        wait_for(&events, |e| *e == PanelEvent::FanSpeed(String::from("low")));

        let state = state.lock().await.clone();
        assert_eq!(state.temperature, 24.0);
        assert_eq!(state.fan_speed, "low");

        sender.send(ClientMessage::Stop).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn toggles_ac() {
        let (state, client) = start_server().await;
        let (events_sender, _events) = mpsc::channel();
        let (sender, handle) = start_worker(Worker::new(client, events_sender, LONG));

        sender.send(ClientMessage::ToggleAc(AcStatus::On)).unwrap();
        for _ in 0..50 {
            if state.lock().await.ac_status == "On" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(state.lock().await.ac_status, "On");

        sender.send(ClientMessage::Stop).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn toggle_does_not_refresh() {
        let (state, client) = start_server().await;
        let (events_sender, events) = mpsc::channel();
        let (sender, handle) = start_worker(Worker::new(client, events_sender, LONG));

        // the start-up refresh ends with the ac status
        wait_for(&events, |e| matches!(e, PanelEvent::AcStatus(_)));

        sender.send(ClientMessage::ToggleAc(AcStatus::On)).unwrap();
        for _ in 0..50 {
            if state.lock().await.ac_status == "On" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(state.lock().await.ac_status, "On");
        assert!(events.recv_timeout(Duration::from_millis(500)).is_err());

        sender.send(ClientMessage::Stop).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pushes_sensor_reading() {
        let (state, client) = start_server().await;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "72 01 4b 46 7f ff 0e 10 57 : crc=57 YES\n72 01 4b 46 7f ff 0e 10 57 t=21500\n"
        )
        .unwrap();
        let (events_sender, events) = mpsc::channel();
        let worker = Worker::new(client, events_sender, LONG).with_sensor(W1Sensor::new(file.path()));
        let (sender, handle) = start_worker(worker);

        wait_for(&events, |e| *e == PanelEvent::Temperature(21.5));
        assert_eq!(state.lock().await.temperature, 21.5);

        sender.send(ClientMessage::Stop).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_sensor_read_skips_update() {
        let (state, client) = start_server().await;
        let dir = tempfile::tempdir().unwrap();
        let (events_sender, events) = mpsc::channel();
        let worker = Worker::new(client, events_sender, LONG)
            .with_sensor(W1Sensor::new(dir.path().join("w1_slave")));
        let (sender, handle) = start_worker(worker);

        wait_for(&events, |e| *e == PanelEvent::Temperature(20.0));
        assert_eq!(state.lock().await.temperature, 20.0);

        sender.send(ClientMessage::Stop).unwrap();
        handle.await.unwrap();
    }

    #[test]
    fn formats_lcd_lines() {
        let snapshot = Snapshot {
            temperature: 21.5,
            fan_speed: String::from("medium"),
            ac_status: String::from("Off"),
        };
        assert_eq!(
            lcd_lines(&snapshot),
            (String::from("Temp 21.5°C"), String::from("medium AC Off"))
        );
    }
}
