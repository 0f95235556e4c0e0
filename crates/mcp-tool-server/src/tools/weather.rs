//! Weather tool
//!
//! Serves demo data: the report is derived from a hash of the location, so
//! the same place always gets the same weather and no network is needed.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::error::{Result, ToolServerError};
use crate::tool::{Tool, ToolDefinition};

const CONDITIONS: [&str; 6] = ["sunny", "partly cloudy", "overcast", "light rain", "thunderstorms", "foggy"];

/// Deterministic weather report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherReport {
    pub temperature_c: i64,
    pub condition: &'static str,
    pub humidity: u64,
    pub wind_kmh: u64,
}

impl WeatherReport {
    pub fn for_location(location: &str) -> Self {
        let h = fnv1a(location.trim().to_lowercase().as_bytes());
        Self {
            temperature_c: i64::try_from(h % 40).unwrap_or(0) - 5,
            condition: CONDITIONS[usize::try_from((h >> 8) % CONDITIONS.len() as u64).unwrap_or(0)],
            humidity: 30 + (h >> 16) % 60,
            wind_kmh: (h >> 24) % 40,
        }
    }

    fn render(&self, location: &str, imperial: bool) -> String {
        let (temperature, unit, wind, speed) = if imperial {
            (
                self.temperature_c * 9 / 5 + 32,
                "F",
                (self.wind_kmh * 621 + 500) / 1000,
                "mph",
            )
        } else {
            (self.temperature_c, "C", self.wind_kmh, "km/h")
        };

        format!(
            "Weather in {}: {}°{}, {}, humidity {}%, wind {} {} (demo data)",
            location.trim(),
            temperature,
            unit,
            self.condition,
            self.humidity,
            wind,
            speed
        )
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Current weather for a location
pub struct WeatherTool;

#[async_trait]
impl Tool for WeatherTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_weather".into(),
            description: "Get the current weather for a location".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "City or place name"
                    },
                    "units": {
                        "type": "string",
                        "description": "'metric' (default) or 'imperial'",
                        "enum": ["metric", "imperial"]
                    }
                },
                "required": ["location"]
            }),
        }
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String> {
        let location = arguments
            .get("location")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if location.trim().is_empty() {
            return Err(ToolServerError::InvalidParams("location must not be empty".into()));
        }

        let imperial = arguments.get("units").and_then(Value::as_str) == Some("imperial");
        Ok(WeatherReport::for_location(location).render(location, imperial))
    }
}
