//! Built-in tools

pub mod calculator;
pub mod files;
pub mod time;
pub mod weather;

pub use calculator::CalculatorTool;
pub use files::ReadFileTool;
pub use time::TimeTool;
pub use weather::WeatherTool;

use crate::config::ToolServerConfig;
use crate::tool::ToolRegistry;

/// Registry with every built-in tool
pub fn default_registry(config: &ToolServerConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(WeatherTool);
    registry.register(TimeTool);
    registry.register(CalculatorTool);
    registry.register(ReadFileTool::new(config.root.clone(), config.max_file_bytes));
    registry
}
