//! Process-wide configuration, fixed at startup.

/// Knobs set once from the command line and never mutated afterwards.
///
/// Handlers receive a copy; there is no runtime reconfiguration surface.
#[derive(Debug, Clone, Copy)]
pub struct AgentConfig {
    /// When true, every remote execution request must be approved at the
    /// local prompt before a child is spawned.
    pub require_confirmation: bool,
    /// When true, per-request transport logging is suppressed.
    pub quiet_transport: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            require_confirmation: true,
            quiet_transport: true,
        }
    }
}
