//! Scanner report metadata
//!
//! After an analysis the scanner writes `.scannerwork/report-task.txt`, a
//! `key=value` file naming the server-side task that processes the report.

use std::collections::HashMap;

use crate::error::{Result, SonarError};

/// Default location of the report file relative to the analysed project
pub const REPORT_TASK_PATH: &str = ".scannerwork/report-task.txt";

/// Parsed contents of `report-task.txt`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTask {
    pub project_key: String,
    pub server_url: String,
    pub ce_task_id: String,
    pub dashboard_url: Option<String>,
}

impl ReportTask {
    /// Parses the `key=value` lines written by the scanner
    pub fn parse(text: &str) -> Result<Self> {
        let fields: HashMap<&str, &str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim(), value.trim()))
            .collect();

        let required = |key: &str| {
            fields
                .get(key)
                .filter(|value| !value.is_empty())
                .map(|value| value.to_string())
                .ok_or_else(|| SonarError::ParseError(format!("report task is missing '{}'", key)))
        };

        Ok(Self {
            project_key: required("projectKey")?,
            server_url: required("serverUrl")?,
            ce_task_id: required("ceTaskId")?,
            dashboard_url: fields.get("dashboardUrl").map(|value| value.to_string()),
        })
    }
}
