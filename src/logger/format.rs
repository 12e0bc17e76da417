//! Access log line formats
//!
//! `logging.access_log_format` names one of the presets (`combined`,
//! `common`, `json`) or is a template where `$name` expands to a field of
//! the entry. Unknown `$names` are written through untouched.

use chrono::{DateTime, Local};
use std::borrow::Cow;

const CLF_TIME: &str = "%d/%b/%Y:%H:%M:%S %z";

/// One served request
#[derive(Debug, Clone)]
pub struct AccessLogEntry {
    pub remote_addr: String,
    pub time: DateTime<Local>,
    pub method: String,
    pub path: String,
    /// Raw query string, without the `?`
    pub query: Option<String>,
    /// e.g. `1.1`
    pub http_version: String,
    pub status: u16,
    pub body_bytes: usize,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    pub request_time_us: u64,
}

enum LogFormat<'a> {
    Common,
    Combined,
    Json,
    Template(&'a str),
}

impl<'a> LogFormat<'a> {
    fn parse(name: &'a str) -> Self {
        match name {
            "common" => Self::Common,
            "combined" => Self::Combined,
            "json" => Self::Json,
            template => Self::Template(template),
        }
    }
}

impl AccessLogEntry {
    pub fn format(&self, format: &str) -> String {
        match LogFormat::parse(format) {
            LogFormat::Common => self.common(),
            LogFormat::Combined => format!(
                "{} \"{}\" \"{}\"",
                self.common(),
                dash(self.referer.as_deref()),
                dash(self.user_agent.as_deref()),
            ),
            LogFormat::Json => self.json(),
            LogFormat::Template(template) => self.expand(template),
        }
    }

    /// Path plus query string
    fn uri(&self) -> Cow<'_, str> {
        match &self.query {
            Some(q) => Cow::Owned(format!("{}?{q}", self.path)),
            None => Cow::Borrowed(&self.path),
        }
    }

    fn request_line(&self) -> String {
        format!("{} {} HTTP/{}", self.method, self.uri(), self.http_version)
    }

    fn common(&self) -> String {
        format!(
            "{} - - [{}] \"{}\" {} {}",
            self.remote_addr,
            self.time.format(CLF_TIME),
            self.request_line(),
            self.status,
            self.body_bytes,
        )
    }

    fn json(&self) -> String {
        serde_json::json!({
            "remote_addr": self.remote_addr,
            "time": self.time.to_rfc3339(),
            "method": self.method,
            "path": self.path,
            "query": self.query,
            "http_version": self.http_version,
            "status": self.status,
            "body_bytes": self.body_bytes,
            "referer": self.referer,
            "user_agent": self.user_agent,
            "request_time_us": self.request_time_us,
        })
        .to_string()
    }

    fn variable(&self, name: &str) -> Option<Cow<'_, str>> {
        let value = match name {
            "remote_addr" => Cow::Borrowed(self.remote_addr.as_str()),
            "time_local" => Cow::Owned(self.time.format(CLF_TIME).to_string()),
            "time_iso8601" => Cow::Owned(self.time.to_rfc3339()),
            "request" => Cow::Owned(self.request_line()),
            "request_method" => Cow::Borrowed(self.method.as_str()),
            "request_uri" => self.uri(),
            "status" => Cow::Owned(self.status.to_string()),
            "body_bytes_sent" => Cow::Owned(self.body_bytes.to_string()),
            "http_referer" => Cow::Borrowed(dash(self.referer.as_deref())),
            "http_user_agent" => Cow::Borrowed(dash(self.user_agent.as_deref())),
            // seconds, millisecond precision
            "request_time" => Cow::Owned(format!(
                "{}.{:03}",
                self.request_time_us / 1_000_000,
                self.request_time_us % 1_000_000 / 1_000
            )),
            _ => return None,
        };
        Some(value)
    }

    /// Single left-to-right pass; a variable name is the longest run of
    /// `[a-z0-9_]` after `$`.
    fn expand(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len() + 64);
        let mut rest = template;

        while let Some(at) = rest.find('$') {
            out.push_str(&rest[..at]);
            let after = &rest[at + 1..];
            let len = after
                .find(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'))
                .unwrap_or(after.len());
            let name = &after[..len];

            match self.variable(name) {
                Some(value) => out.push_str(&value),
                None => {
                    out.push('$');
                    out.push_str(name);
                }
            }
            rest = &after[len..];
        }
        out.push_str(rest);
        out
    }
}

fn dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}
