use thermopanel_api::types::{
    adjust_temperature, format_temperature, parse_displayed_temperature, AcStatus, Warning,
};

/// Something the worker learned from the server
#[derive(Debug, Clone, PartialEq)]
pub enum PanelEvent {
    Temperature(f64),
    FanSpeed(String),
    AcStatus(String),
}

/// The text currently on screen. Values read back from these fields are the
/// only client side state, there is no separate model of the thermostat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Panel {
    pub temperature: String,
    pub fan_speed: String,
    pub ac_status: String,
    pub warning: Option<Warning>,
}

impl Panel {
    pub fn apply(&mut self, event: PanelEvent) {
        match event {
            PanelEvent::Temperature(t) => self.temperature = format_temperature(t),
            PanelEvent::FanSpeed(s) => self.fan_speed = s,
            PanelEvent::AcStatus(s) => self.ac_status = s,
        }
    }

    /// Returns the temperature to send to the server, or `None` if the
    /// displayed value couldn't be read.
    pub fn adjust_temperature(&mut self, delta: f64) -> Option<f64> {
        let current = match parse_displayed_temperature(&self.temperature) {
            Some(t) => t,
            None => {
                self.warning = Some(Warning::InvalidTemperature);
                return None;
            }
        };
        let adjustment = adjust_temperature(current, delta);
        if adjustment.warning.is_some() {
            self.warning = adjustment.warning;
        }
        self.temperature = format_temperature(adjustment.temperature);
        Some(adjustment.temperature)
    }

    /// Flips the label right away and returns the status to request.
    pub fn toggle_ac(&mut self) -> AcStatus {
        let next = AcStatus::toggled_from_label(&self.ac_status);
        self.ac_status = next.to_string();
        next
    }

    pub fn dismiss_warning(&mut self) {
        self.warning = None;
    }
}
