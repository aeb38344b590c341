use std::collections::BTreeMap;
use std::sync::Arc;

use super::pylint::PylintDriver;
use super::regex_driver;
use super::xml::{CheckstyleXmlDriver, FindbugsDriver, PmdDriver};
use super::QualityDriver;
use crate::config::Config;
use crate::error::{DiffCovError, Result};

/// Quality drivers by tool name.
#[derive(Default)]
pub struct ToolRegistry {
    drivers: BTreeMap<String, Arc<dyn QualityDriver>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in driver. `config` supplies driver settings such as the
    /// eslint report root.
    pub fn builtin(config: &Config) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(regex_driver::pycodestyle()));
        registry.register(Arc::new(regex_driver::pyflakes()));
        registry.register(Arc::new(regex_driver::flake8()));
        registry.register(Arc::new(regex_driver::pydocstyle()));
        registry.register(Arc::new(PylintDriver));
        registry.register(Arc::new(regex_driver::jshint()));
        registry.register(Arc::new(
            regex_driver::eslint().with_report_root(config.report_root_path.clone()),
        ));
        registry.register(Arc::new(regex_driver::cppcheck()));
        registry.register(Arc::new(regex_driver::checkstyle()));
        registry.register(Arc::new(CheckstyleXmlDriver));
        registry.register(Arc::new(FindbugsDriver));
        registry.register(Arc::new(PmdDriver));
        registry
    }

    /// Add a driver, replacing any registered under the same name.
    pub fn register(&mut self, driver: Arc<dyn QualityDriver>) {
        self.drivers.insert(driver.name().to_string(), driver);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn QualityDriver>> {
        self.drivers
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| DiffCovError::ToolNotSupported(name.to_string()))
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.drivers.keys().map(String::as_str).collect()
    }
}
