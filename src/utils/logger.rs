// src/utils/logger.rs

use serde_json::Value;
use std::collections::HashMap;

/// Log levels supported by the logger
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }

    pub fn from_string(s: &str) -> LogLevel {
        match s.to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" | "warning" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            _ => LogLevel::Info, // default
        }
    }
}

/// Per-service logger over the `log` facade, carrying structured context.
#[derive(Debug, Clone)]
pub struct Logger {
    level: LogLevel,
    context: HashMap<String, Value>,
}

impl Logger {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            context: HashMap::new(),
        }
    }

    pub fn from_env() -> Self {
        let level_str = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        Self::new(LogLevel::from_string(&level_str))
    }

    /// Logger named after the service that owns it.
    pub fn named(component: &str) -> Self {
        let mut logger = Self::from_env();
        logger.add_context("component", Value::String(component.to_string()));
        logger
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.level = level;
    }

    pub fn get_level(&self) -> LogLevel {
        self.level
    }

    pub fn add_context(&mut self, key: &str, value: Value) {
        self.context.insert(key.to_string(), value);
    }

    pub fn child(&self, context: HashMap<String, Value>) -> Self {
        let mut new_context = self.context.clone();
        new_context.extend(context);
        Self {
            level: self.level,
            context: new_context,
        }
    }

    fn render(&self, message: &str) -> String {
        if self.context.is_empty() {
            return message.to_string();
        }
        let mut pairs: Vec<String> = self
            .context
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => format!("{}={}", k, s),
                other => format!("{}={}", k, other),
            })
            .collect();
        pairs.sort();
        format!("[{}] {}", pairs.join(" "), message)
    }

    fn should_log(&self, level: LogLevel) -> bool {
        level <= self.level
    }

    pub fn error(&self, message: &str) {
        if self.should_log(LogLevel::Error) {
            log::error!("{}", self.render(message));
        }
    }

    pub fn warn(&self, message: &str) {
        if self.should_log(LogLevel::Warn) {
            log::warn!("{}", self.render(message));
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_log(LogLevel::Info) {
            log::info!("{}", self.render(message));
        }
    }

    pub fn debug(&self, message: &str) {
        if self.should_log(LogLevel::Debug) {
            log::debug!("{}", self.render(message));
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!(LogLevel::from_string("warn"), LogLevel::Warn);
        assert_eq!(LogLevel::from_string("WARNING"), LogLevel::Warn);
        assert_eq!(LogLevel::from_string("nonsense"), LogLevel::Info);
    }

    #[test]
    fn test_context_renders_into_message() {
        let mut logger = Logger::new(LogLevel::Debug);
        logger.add_context("component", Value::String("planner".to_string()));
        assert_eq!(
            logger.render("splitting range"),
            "[component=planner] splitting range"
        );
    }

    #[test]
    fn test_child_inherits_context() {
        let mut parent = Logger::new(LogLevel::Info);
        parent.add_context("component", Value::String("cloud".to_string()));
        let child = parent.child(HashMap::from([(
            "day".to_string(),
            Value::String("2026-08-01".to_string()),
        )]));
        let rendered = child.render("fetching");
        assert!(rendered.contains("component=cloud"));
        assert!(rendered.contains("day=2026-08-01"));
    }
}
