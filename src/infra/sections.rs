//! Application sections and building selection
//!
//! A section is one kind of gateway peripheral. Each one publishes to its own
//! routing key (`<queue>.<route>`) and job class.

use serde::Deserialize;
use std::io::{BufRead, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Sensors,
    Rfid,
    Barrier,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Sensors => "sensors",
            Section::Rfid => "rfid",
            Section::Barrier => "barrier",
        }
    }

    /// Routing key suffix, `None` while the section has no consumer
    pub fn route(&self) -> Option<&'static str> {
        match self {
            Section::Sensors => Some("ultrasonic-sensors"),
            Section::Rfid => Some("rfids"),
            Section::Barrier => None,
        }
    }

    /// Job class the consumer instantiates
    pub fn namespace(&self) -> Option<&'static str> {
        match self {
            Section::Sensors => Some("App\\Jobs\\SystemLogs\\UltrasonicSensors\\SensorLog"),
            Section::Rfid => Some("App\\Jobs\\SystemLogs\\RFIDs\\RFIDLog"),
            Section::Barrier => None,
        }
    }

    pub fn routing_key(&self, queue: &str) -> Option<String> {
        self.route().map(|route| format!("{}.{}", queue, route))
    }

    /// Only the sensors section has a polling loop
    pub fn is_pollable(&self) -> bool {
        matches!(self, Section::Sensors)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InputError {
    #[error("no buildings configured")]
    NoBuildings,
    #[error("you must enter building number between 1 to {0}")]
    OutOfRange(usize),
    #[error("unknown building '{0}'")]
    UnknownBuilding(String),
    #[error("failed to read building from input: {0}")]
    Io(String),
}

/// Pick a building by name or 1-based index
pub fn resolve_building(buildings: &[String], choice: &str) -> Result<String, InputError> {
    let choice = choice.trim();
    if buildings.is_empty() {
        return Err(InputError::NoBuildings);
    }
    if let Some(name) = buildings.iter().find(|b| b.eq_ignore_ascii_case(choice)) {
        return Ok(name.clone());
    }
    match choice.parse::<usize>() {
        Ok(n) if (1..=buildings.len()).contains(&n) => Ok(buildings[n - 1].clone()),
        Ok(_) => Err(InputError::OutOfRange(buildings.len())),
        Err(_) => Err(InputError::UnknownBuilding(choice.to_string())),
    }
}

/// Print the numbered building list and read one choice
pub fn prompt_building<R: BufRead, W: Write>(
    buildings: &[String],
    mut input: R,
    mut output: W,
) -> Result<String, InputError> {
    if buildings.is_empty() {
        return Err(InputError::NoBuildings);
    }

    let io_err = |e: std::io::Error| InputError::Io(e.to_string());
    writeln!(output, "Enter building name from the following list:").map_err(io_err)?;
    for (index, name) in buildings.iter().enumerate() {
        writeln!(output, "{}) {}", index + 1, name).map_err(io_err)?;
    }
    write!(output, "Building name: ").map_err(io_err)?;
    output.flush().map_err(io_err)?;

    let mut line = String::new();
    input.read_line(&mut line).map_err(io_err)?;
    resolve_building(buildings, &line)
}
