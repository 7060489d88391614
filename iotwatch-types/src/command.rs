//! Request bodies for the command and limits endpoints.

use std::fmt;
use std::str::FromStr;

/// An actuator command understood by the devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum DeviceAction {
    LedOn,
    LedOff,
    FanOn,
    FanOff,
    FanAuto,
}

impl DeviceAction {
    /// Wire tag, e.g. `"LED_ON"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceAction::LedOn => "LED_ON",
            DeviceAction::LedOff => "LED_OFF",
            DeviceAction::FanOn => "FAN_ON",
            DeviceAction::FanOff => "FAN_OFF",
            DeviceAction::FanAuto => "FAN_AUTO",
        }
    }
}

impl fmt::Display for DeviceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown action tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseActionError(String);

impl fmt::Display for ParseActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown device action '{}'", self.0)
    }
}

impl std::error::Error for ParseActionError {}

impl FromStr for DeviceAction {
    type Err = ParseActionError;

    /// Accepts `LED_ON`, `led-on` and `led on` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "LED_ON" => Ok(DeviceAction::LedOn),
            "LED_OFF" => Ok(DeviceAction::LedOff),
            "FAN_ON" => Ok(DeviceAction::FanOn),
            "FAN_OFF" => Ok(DeviceAction::FanOff),
            "FAN_AUTO" => Ok(DeviceAction::FanAuto),
            _ => Err(ParseActionError(s.to_string())),
        }
    }
}

/// Body of `POST /command`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommandRequest {
    pub device: String,
    pub action: DeviceAction,
}

/// Body of `POST /set_limits`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LimitsRequest {
    pub device: String,
    pub temp_th: f64,
    pub gas_th: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parse_spellings() {
        assert_eq!("LED_ON".parse::<DeviceAction>(), Ok(DeviceAction::LedOn));
        assert_eq!("led-off".parse::<DeviceAction>(), Ok(DeviceAction::LedOff));
        assert_eq!("fan auto".parse::<DeviceAction>(), Ok(DeviceAction::FanAuto));
        assert!("SELF_DESTRUCT".parse::<DeviceAction>().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_command_request_json() {
        let request = CommandRequest {
            device: "node1".to_string(),
            action: DeviceAction::LedOn,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"device":"node1","action":"LED_ON"}"#);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_limits_request_json() {
        let request = LimitsRequest {
            device: "node1".to_string(),
            temp_th: 35.0,
            gas_th: 1.5,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["temp_th"], 35.0);
        assert_eq!(value["gas_th"], 1.5);
    }
}
