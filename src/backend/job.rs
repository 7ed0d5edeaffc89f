//! Job Definition
//!
//! Describes the unit of work a production transformation turns into
//! tasks: fetch the bootstrap executable, make it runnable, and run it with
//! the step's argument vector.

use serde::{Deserialize, Serialize};

/// Location the bootstrap executables are downloaded from.
pub const DEFAULT_CODE_URL: &str = "http://dirac-code.ihep.ac.cn/juno/ts";

/// Placeholder the backend replaces with the job identifier.
pub const JOB_ID_PLACEHOLDER: &str = "@{JOB_ID}";

/// One executable invocation inside a job.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JobCommand {
    pub executable: String,
    pub arguments: String,
    /// Workflow modules wrapping the command; empty means a plain script
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<String>,
}

/// A job definition attached to a transformation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JobDescription {
    /// Job name, equal to the transformation name
    pub name: String,

    /// Commands executed in order
    pub commands: Vec<JobCommand>,

    /// Files returned in the output sandbox
    #[serde(default)]
    pub output_sandbox: Vec<String>,

    /// Sites the job may run at; empty means any site
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destination: Vec<String>,

    /// Sites the job must not run at
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub banned_sites: Vec<String>,
}

impl JobDescription {
    /// Creates an empty job definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
            output_sandbox: vec!["*log".to_string()],
            destination: Vec::new(),
            banned_sites: Vec::new(),
        }
    }

    /// Builds the standard download, chmod, run sequence for `executable`.
    ///
    /// # Example
    ///
    /// ```
    /// use prodchain::backend::job::JobDescription;
    ///
    /// let job = JobDescription::bootstrap("step", "http://code", "bootstrap.sh", &["J17".to_string()]);
    /// assert_eq!(job.commands.len(), 3);
    /// assert_eq!(job.commands[2].arguments, "\"J17\"");
    /// ```
    pub fn bootstrap(
        name: impl Into<String>,
        code_url: &str,
        executable: &str,
        arguments: &[String],
    ) -> Self {
        Self::new(name)
            .with_command(
                "/usr/bin/wget",
                format!("\"{}/{}\"", code_url.trim_end_matches('/'), executable),
            )
            .with_command("/bin/chmod", format!("+x \"{}\"", executable))
            .with_command(executable, arguments.join(" "))
    }

    /// Appends a command.
    pub fn with_command(mut self, executable: impl Into<String>, arguments: impl Into<String>) -> Self {
        self.commands.push(JobCommand {
            executable: executable.into(),
            arguments: arguments.into(),
            modules: Vec::new(),
        });
        self
    }

    /// Appends the final command whose failover module retries failed
    /// uploads and registrations.
    pub fn with_failover_request(mut self) -> Self {
        self.commands.push(JobCommand {
            executable: "/bin/ls".to_string(),
            arguments: "-l".to_string(),
            modules: vec!["Script".to_string(), "FailoverRequest".to_string()],
        });
        self
    }

    /// Replaces the files returned in the output sandbox.
    pub fn with_output_sandbox(mut self, files: Vec<String>) -> Self {
        self.output_sandbox = files;
        self
    }

    /// Restricts the job to the given sites.
    pub fn with_destination(mut self, sites: Vec<String>) -> Self {
        self.destination = sites;
        self
    }

    /// Excludes the given sites.
    pub fn with_banned_sites(mut self, sites: Vec<String>) -> Self {
        self.banned_sites = sites;
        self
    }

    /// Renders the commands as a shell script, for display.
    pub fn to_script(&self) -> String {
        let mut script = String::from("#!/bin/bash\nset -e\n");
        for command in &self.commands {
            script.push_str(&command.executable);
            if !command.arguments.is_empty() {
                script.push(' ');
                script.push_str(&command.arguments);
            }
            script.push('\n');
        }
        script
    }
}

/// Quotes an argument for the job command line.
pub fn quote(arg: &str) -> String {
    format!("\"{}\"", arg.replace('"', "\\\""))
}
