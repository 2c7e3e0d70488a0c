//! Health report served by `GET /health`
//!
//! The database is the only component that can be unhealthy; the
//! collaborators are reported as enabled or disabled by configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    Healthy,
    Unhealthy,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub state: ComponentState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentHealth {
    pub fn healthy(name: impl Into<String>) -> Self {
        Self { name: name.into(), state: ComponentState::Healthy, message: None }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), state: ComponentState::Unhealthy, message: Some(message.into()) }
    }

    /// Healthy when `enabled`, otherwise disabled by configuration.
    pub fn configured(name: impl Into<String>, enabled: bool) -> Self {
        let state = if enabled { ComponentState::Healthy } else { ComponentState::Disabled };
        Self { name: name.into(), state, message: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub is_healthy: bool,
    pub components: Vec<ComponentHealth>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn new(checked_at: DateTime<Utc>) -> Self {
        Self { is_healthy: true, components: Vec::new(), checked_at }
    }

    /// Add a component; any unhealthy component makes the report unhealthy.
    pub fn add_component(mut self, component: ComponentHealth) -> Self {
        if component.state == ComponentState::Unhealthy {
            self.is_healthy = false;
        }
        self.components.push(component);
        self
    }
}
