//! Component filter rules
//!
//! Rules are plain data: the frontend sends them as JSON, embedding
//! applications can also load them from the config file. Compilation into
//! matchers (regexes, type sets) happens in [`crate::tracker::filter`].

use crate::types::ElementType;
use serde::{Deserialize, Serialize};

/// One user-configured visibility rule
///
/// Wire shape: `{"type": "elementType", "value": "hostComponent", "isEnabled": true}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ComponentFilter {
    /// Hide every node classified as `value`
    ElementType {
        value: ElementType,
        #[serde(rename = "isEnabled", default = "enabled")]
        is_enabled: bool,
    },
    /// Hide nodes whose display name matches the regex `value`
    DisplayName {
        value: String,
        #[serde(rename = "isEnabled", default = "enabled")]
        is_enabled: bool,
    },
    /// Hide nodes whose source path matches the regex `value`
    Location {
        value: String,
        #[serde(rename = "isEnabled", default = "enabled")]
        is_enabled: bool,
    },
    /// Hide higher-order wrappers (display names containing a parenthesis)
    Hoc {
        #[serde(rename = "isEnabled", default = "enabled")]
        is_enabled: bool,
    },
}

fn enabled() -> bool {
    true
}

impl ComponentFilter {
    /// Enabled element-type rule
    pub fn element_type(value: ElementType) -> Self {
        ComponentFilter::ElementType {
            value,
            is_enabled: true,
        }
    }

    /// Enabled display-name rule
    pub fn display_name(pattern: impl Into<String>) -> Self {
        ComponentFilter::DisplayName {
            value: pattern.into(),
            is_enabled: true,
        }
    }

    /// Enabled source-path rule
    pub fn location(pattern: impl Into<String>) -> Self {
        ComponentFilter::Location {
            value: pattern.into(),
            is_enabled: true,
        }
    }

    /// Enabled higher-order-wrapper rule
    pub fn hoc() -> Self {
        ComponentFilter::Hoc { is_enabled: true }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            ComponentFilter::ElementType { is_enabled, .. }
            | ComponentFilter::DisplayName { is_enabled, .. }
            | ComponentFilter::Location { is_enabled, .. }
            | ComponentFilter::Hoc { is_enabled } => *is_enabled,
        }
    }

    /// Same rule, disabled
    pub fn disabled(mut self) -> Self {
        match &mut self {
            ComponentFilter::ElementType { is_enabled, .. }
            | ComponentFilter::DisplayName { is_enabled, .. }
            | ComponentFilter::Location { is_enabled, .. }
            | ComponentFilter::Hoc { is_enabled } => *is_enabled = false,
        }
        self
    }
}

/// Rules applied when nothing else is configured: host primitives hidden
pub fn default_component_filters() -> Vec<ComponentFilter> {
    vec![ComponentFilter::element_type(ElementType::HostComponent)]
}
