//! RouterOS scripts handed back to devices
//!
//! The device never parses structured responses: every reply is a script
//! it runs with `:parse`. Collection order comes from
//! [`mnms_core::Section::ALL`] so the script and the decoder agree on the
//! envelope layout.
//!
//! The task token lives inside the scheduler's `on-event`, which RouterOS
//! keeps across reboots. Every task rewrites that event with a fresh token.
//! A device that stays offline longer than the token lifetime is locked out
//! and recovers by running its enrollment command again; onboarding finds
//! the serial and reinstalls the scheduler.

use mnms_core::{Section, SECTION_SEPARATOR};

use crate::config::SchedulerConfig;

/// Builds the scripts for one deployment
#[derive(Debug, Clone)]
pub struct ScriptBuilder {
    base_url: String,
    scheduler: SchedulerConfig,
}

impl ScriptBuilder {
    pub fn new(public_url: &str, scheduler: SchedulerConfig) -> Self {
        Self {
            base_url: public_url.trim_end_matches('/').to_string(),
            scheduler,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Script returned by the enrollment route: collect a report and post
    /// it to onboarding, then run whatever comes back.
    pub fn enrollment(&self, token: &str) -> String {
        let mut script = collection_lines();
        script.push(format!(
            ":local response ([/tool/fetch url={} http-data=$payload http-method=post http-header-field=\"Authorization: Bearer {}, Content-Type: text/plain\" as-value output=user]->\"data\");",
            self.url("/api/onboarding"),
            token
        ));
        script.push(":local script [:parse $response]".to_string());
        script.push("$script".to_string());
        script.join("\n")
    }

    /// Scheduler event: fetch the tasks with `token` and run each of them
    fn task_fetch(&self, token: &str) -> String {
        format!(
            ":do {{:local tasks ([/tool/fetch url={} http-header-field=\"Authorization: Bearer {}\" as-value output=user]->\"data\"); :foreach task in=[:toarray $tasks] do={{:local runTask [:parse $task]; $runTask;}}}} on-error {{}}",
            self.url("/api/tasks"),
            token
        )
    }

    /// Script returned by onboarding: install the recurring scheduler that
    /// fetches and runs tasks, replacing any previous one.
    pub fn scheduler(&self, token: &str) -> String {
        let name = &self.scheduler.name;
        [
            format!("/system/scheduler/remove [find name=\"{}\"]", name),
            format!(
                "/system/scheduler/add name={} interval={} on-event=\"{}\" start-time=startup",
                name,
                self.scheduler.interval,
                escape(&self.task_fetch(token))
            ),
        ]
        .join("\n")
    }

    /// Script returned by `/api/tasks`: store the refreshed task token in
    /// the scheduler, collect a report and post it as telemetry.
    pub fn task(&self, refresh_token: &str, telemetry_token: &str) -> String {
        let mut script = vec![format!(
            "/system/scheduler/set [find name=\"{}\"] on-event=\"{}\"",
            self.scheduler.name,
            escape(&self.task_fetch(refresh_token))
        )];
        script.extend(collection_lines());
        script.push(format!(
            ":tool/fetch url={} http-method=post http-data=$payload http-header-field=\"Authorization: Bearer {}\" as-value output=user",
            self.url("/api/telemetry"),
            telemetry_token
        ));
        escape(&script.join("\n"))
    }
}

/// Lines that build `$payload` from the eight listings
fn collection_lines() -> Vec<String> {
    let mut lines = vec![":global payload (\"\")".to_string()];
    for (i, section) in Section::ALL.iter().enumerate() {
        if i == 0 {
            lines.push(format!(":set payload (([tostr [{}]]))", section.command()));
        } else {
            lines.push(format!(
                ":set payload ($payload.\"{}\".([tostr [{}]]))",
                SECTION_SEPARATOR,
                section.command()
            ));
        }
    }
    lines
}

/// Escape a script for embedding in a quoted RouterOS string
fn escape(script: &str) -> String {
    let mut out = String::with_capacity(script.len() + script.len() / 8);
    for c in script.chars() {
        if matches!(c, '"' | '$' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
