use eyre::{eyre, Result, WrapErr};
use structopt::clap::AppSettings;
use structopt::StructOpt;
use thermopanel_api::client::ThermostatClient;
use thermopanel_api::types::{adjust_temperature, format_temperature, AcStatus, FanSpeed};

#[derive(StructOpt, Debug)]
pub enum TemperatureOpt {
    /// Raise the target by one degree
    Up,
    /// Lower the target by one degree
    Down,
    /// Set the target without range checks
    #[structopt(setting = AppSettings::AllowNegativeNumbers)]
    Set { value: f64 },
}

pub async fn status(client: &ThermostatClient) -> Result<()> {
    let snapshot = client.snapshot().await;
    println!("Temperature: {}°C", format_temperature(snapshot.temperature));
    println!("Fan speed:   {}", snapshot.fan_speed);
    println!("AC:          {}", snapshot.ac_status);
    Ok(())
}

async fn stepped(client: &ThermostatClient, delta: f64) -> Result<f64> {
    let current = client
        .temperature()
        .await
        .wrap_err("Could not read current temperature")?;
    let adjustment = adjust_temperature(current, delta);
    if let Some(warning) = adjustment.warning {
        eprintln!("{}: {}", warning.title(), warning.message());
    }
    Ok(adjustment.temperature)
}

pub async fn temperature(client: &ThermostatClient, opt: TemperatureOpt) -> Result<()> {
    let target = match opt {
        TemperatureOpt::Up => stepped(client, 1.0).await?,
        TemperatureOpt::Down => stepped(client, -1.0).await?,
        TemperatureOpt::Set { value } => value,
    };
    if !target.is_finite() {
        return Err(eyre!("Temperature must be a finite number"));
    }
    client
        .update_temperature(target)
        .await
        .wrap_err("Could not update temperature")?;
    println!("Temperature set to {}°C", format_temperature(target));
    Ok(())
}

pub async fn fan(client: &ThermostatClient, speed: FanSpeed) -> Result<()> {
    client
        .set_fan_speed(speed.as_ref())
        .await
        .wrap_err("Could not set fan speed")?;
    println!("Fan speed set to {}", speed);
    Ok(())
}

pub async fn toggle_ac(client: &ThermostatClient) -> Result<()> {
    let current = client
        .ac_status()
        .await
        .wrap_err("Could not read AC status")?;
    let ack = client
        .toggle_ac(AcStatus::toggled_from_label(&current))
        .await
        .wrap_err("Could not toggle AC")?;
    println!("AC is now {}", ack.ac_status);
    Ok(())
}
