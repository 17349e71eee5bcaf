use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::capture::Capture;
use crate::mirage::frame::Frame;
use crate::mirage::{ClimateState, FanSpeed, Mode, Phy, SwingMode, TEMP_MAX, TEMP_MIN};

/*
{
   "manufacturer":"Mirage",
   "supportedModels":[
      "KKG9A-C1"
   ],
   "supportedController":"Broadlink",
   "commandsEncoding":"Base64",
   "minTemperature":16.0,
   "maxTemperature":32.0,
   "precision":1,
   "operationModes":[
      "auto",
      "cool",
      "dry",
      "heat",
      "fan"
   ],
   "fanModes":[
      "auto",
      "low",
      "medium",
      "high"
   ],
   */

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CodeFile {
    pub manufacturer: String,
    pub supported_models: Vec<String>,
    pub supported_controller: String,
    pub commands_encoding: String,
    pub min_temperature: f32,
    pub max_temperature: f32,
    pub precision: u8,
    pub operation_modes: Vec<String>,
    pub fan_modes: Vec<String>,
    pub commands: serde_json::Value,
}

/// Builds a SmartIR code file from all reachable states. Commands are nested
/// mode -> fan -> temperature, plus a single "off" entry.
pub fn code_file() -> anyhow::Result<CodeFile> {
    let phy = Phy::new();

    let commands: serde_json::Value = {
        let mut all_commands = serde_json::Map::new();

        for mode in Mode::iter() {
            let mode_map = all_commands
                .entry(mode.as_ref())
                .or_insert(serde_json::Map::new().into());
            let mode_map = mode_map.as_object_mut().unwrap();

            for fan in FanSpeed::iter() {
                let fan_map = mode_map
                    .entry(fan.as_ref())
                    .or_insert(serde_json::Map::new().into());
                let fan_map = fan_map.as_object_mut().unwrap();

                for temperature in TEMP_MIN..=TEMP_MAX {
                    let state = ClimateState {
                        power: true,
                        mode,
                        temperature,
                        fan,
                        swing: SwingMode::Off,
                    };

                    fan_map
                        .insert(format!("{}", temperature), encode_state(&phy, &state)?.into());
                }
            }
        }

        // Add "Off" state
        let off_state = ClimateState {
            power: false,
            ..ClimateState::default()
        };
        all_commands.insert("off".into(), encode_state(&phy, &off_state)?.into());

        all_commands.into()
    };

    Ok(CodeFile {
        manufacturer: "Mirage".into(),
        supported_models: vec!["KKG9A-C1".into()],
        supported_controller: "Broadlink".into(),
        commands_encoding: "Base64".into(),
        min_temperature: TEMP_MIN as f32,
        max_temperature: TEMP_MAX as f32,
        precision: 1,
        operation_modes: Mode::iter().map(|m| m.as_ref().to_string()).collect(),
        fan_modes: FanSpeed::iter().map(|f| f.as_ref().to_string()).collect(),
        commands,
    })
}

fn encode_state(phy: &Phy, state: &ClimateState) -> anyhow::Result<String> {
    let frame: Frame = Frame::try_from(state)?;
    let capture = Capture::new_ir(phy.encode(&frame));
    Ok(base64::encode(capture.to_bytes()))
}
