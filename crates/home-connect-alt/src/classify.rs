//! Deciding which entity domain a setting or option belongs to

use home_connect_api::{Parameter, ValueType};
use serde_json::Value;

/// The kind of control a parameter is exposed as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// A `number` entity
    Numeric,
    /// A `switch` entity
    Boolean,
    /// Not exposed by this integration
    Unsupported,
}

/// Classify a parameter
///
/// The declared type decides first. Parameters whose type is missing or
/// unexpected still become switches when they hold a boolean value, since
/// the service does not always report types.
pub fn classify(parameter: &Parameter) -> ControlKind {
    match &parameter.value_type {
        Some(ValueType::Int | ValueType::Float | ValueType::Double) => ControlKind::Numeric,
        Some(ValueType::Boolean) => ControlKind::Boolean,
        _ if matches!(parameter.value, Some(Value::Bool(_))) => ControlKind::Boolean,
        _ => ControlKind::Unsupported,
    }
}
