//! Current time tool

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::error::Result;
use crate::tool::{Tool, ToolDefinition};

/// Returns the current UTC time
pub struct TimeTool;

#[async_trait]
impl Tool for TimeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_time".into(),
            description: "Get the current date and time (UTC)".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "format": {
                        "type": "string",
                        "description": "Output format: 'iso', 'human', or 'unix' (default: human)",
                        "enum": ["iso", "human", "unix"]
                    }
                }
            }),
        }
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String> {
        let format = arguments
            .get("format")
            .and_then(Value::as_str)
            .unwrap_or("human");

        Ok(format_time(Utc::now(), format))
    }
}

fn format_time(now: DateTime<Utc>, format: &str) -> String {
    match format {
        "iso" => now.to_rfc3339(),
        "unix" => now.timestamp().to_string(),
        _ => now.format("%A, %B %d, %Y at %H:%M:%S UTC").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_formats() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        assert_eq!(format_time(at, "iso"), "2024-03-09T14:05:00+00:00");
        assert_eq!(format_time(at, "unix"), "1709993100");
        assert_eq!(format_time(at, "human"), "Saturday, March 09, 2024 at 14:05:00 UTC");
    }

    #[tokio::test]
    async fn test_execute_unix_is_current() {
        let mut args = Map::new();
        args.insert("format".into(), json!("unix"));
        let out = TimeTool.execute(&args).await.unwrap();
        let secs: i64 = out.parse().unwrap();
        assert!((Utc::now().timestamp() - secs).abs() < 5);
    }
}
