//! systemd control for the node unit.

use anyhow::Result;

use crate::utils::command::ToolCommand;

/// Stops and starts `<name>.service` through `systemctl`.
#[derive(Debug, Clone)]
pub struct ServiceControl {
    unit: String,
    use_sudo: bool,
    systemctl: String,
}

impl ServiceControl {
    /// `name` may be given with or without the `.service` suffix.
    pub fn new(name: &str, use_sudo: bool) -> Self {
        let name = name.trim();
        let unit = if name.ends_with(".service") { name.to_string() } else { format!("{name}.service") };
        Self {
            unit,
            use_sudo,
            systemctl: "systemctl".to_string(),
        }
    }

    /// Use another `systemctl` executable.
    #[must_use]
    pub fn with_systemctl(mut self, program: impl Into<String>) -> Self {
        self.systemctl = program.into();
        self
    }

    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub async fn stop(&self) -> Result<()> {
        tracing::info!("Stopping {}", self.unit);
        self.systemctl("stop").execute_success().await
    }

    pub async fn start(&self) -> Result<()> {
        tracing::info!("Starting {}", self.unit);
        self.systemctl("start").execute_success().await
    }

    /// `systemctl is-active`; any failure to ask reads as inactive.
    pub async fn is_active(&self) -> bool {
        ToolCommand::new(&self.systemctl).args(["is-active", "--quiet", self.unit.as_str()]).succeeds().await
    }

    fn systemctl(&self, action: &str) -> ToolCommand {
        ToolCommand::privileged(&self.systemctl, self.use_sudo).args([action, self.unit.as_str()])
    }
}
