use std::sync::mpsc;
use std::time::Duration;

use eframe::egui;
use thermopanel_api::types::FanSpeed;
use tokio::sync::mpsc as async_mpsc;

use crate::panel::{Panel, PanelEvent};
use crate::worker::ClientMessage;

const REPAINT_INTERVAL: Duration = Duration::from_millis(250);

const FAN_BUTTONS: [(&str, FanSpeed); 3] = [
    ("Low", FanSpeed::Low),
    ("Medium", FanSpeed::Medium),
    ("High", FanSpeed::High),
];

pub struct ThermostatApp {
    panel: Panel,
    event_receiver: mpsc::Receiver<PanelEvent>,
    client_message_sender: async_mpsc::UnboundedSender<ClientMessage>,
}

impl ThermostatApp {
    pub fn new(
        event_receiver: mpsc::Receiver<PanelEvent>,
        client_message_sender: async_mpsc::UnboundedSender<ClientMessage>,
    ) -> ThermostatApp {
        ThermostatApp {
            panel: Panel::default(),
            event_receiver,
            client_message_sender,
        }
    }

    fn send(&self, msg: ClientMessage) {
        trace!("sending {:?} to worker", msg);
        if self.client_message_sender.send(msg).is_err() {
            error!("Lost connection to the client worker");
        }
    }
}

impl eframe::App for ThermostatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        while let Ok(event) = self.event_receiver.try_recv() {
            self.panel.apply(event);
        }

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
            });
        });

        let mut messages = Vec::new();
        let panel = &mut self.panel;
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Thermostat");
            ui.add_space(8.0);
            egui::Grid::new("controls")
                .num_columns(2)
                .spacing([12.0, 8.0])
                .show(ui, |ui| {
                    ui.label("Temperature (°C)");
                    ui.horizontal(|ui| {
                        ui.add(
                            egui::TextEdit::singleline(&mut panel.temperature).desired_width(60.0),
                        );
                        for (label, delta) in [("-", -1.0), ("+", 1.0)] {
                            if ui.button(label).clicked() {
                                if let Some(t) = panel.adjust_temperature(delta) {
                                    messages.push(ClientMessage::UpdateTemperature(t));
                                }
                            }
                        }
                    });
                    ui.end_row();

                    ui.label("Fan speed");
                    ui.horizontal(|ui| {
                        ui.add(
                            egui::TextEdit::singleline(&mut panel.fan_speed).desired_width(60.0),
                        );
                        for (label, speed) in FAN_BUTTONS {
                            if ui.button(label).clicked() {
                                messages.push(ClientMessage::SetFanSpeed(speed));
                            }
                        }
                    });
                    ui.end_row();

                    ui.label("Air conditioning");
                    ui.horizontal(|ui| {
                        ui.label(egui::RichText::new(panel.ac_status.as_str()).strong());
                        if ui.button("Toggle AC").clicked() {
                            messages.push(ClientMessage::ToggleAc(panel.toggle_ac()));
                        }
                    });
                    ui.end_row();
                });
        });

        if let Some(warning) = self.panel.warning {
            let mut dismissed = false;
            egui::Window::new(warning.title())
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(warning.message());
                    if ui.button("OK").clicked() {
                        dismissed = true;
                    }
                });
            if dismissed {
                self.panel.dismiss_warning();
            }
        }

        for msg in messages {
            self.send(msg);
        }

        // worker events arrive without any input, so keep polling for them
        ctx.request_repaint_after(REPAINT_INTERVAL);
    }
}
