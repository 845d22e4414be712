//! Appliance data model
//!
//! Settings, program options and status entries share one shape,
//! [`Parameter`], deserialized from the JSON the Home Connect service sends:
//!
//! ```json
//! {"key": "Cooking.Oven.Option.SetpointTemperature", "type": "Int",
//!  "value": 180, "unit": "°C", "constraints": {"min": 30, "max": 250, "stepsize": 5}}
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Declared type of a setting or option value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ValueType {
    Int,
    Float,
    Double,
    Boolean,
    String,
    /// Enumerated values (`BSH.Common.EnumType.*` and friends)
    Enumeration(std::string::String),
    /// Any other tag reported by the service
    Other(std::string::String),
}

impl ValueType {
    /// Get the type tag as sent by the service
    pub fn as_str(&self) -> &str {
        match self {
            ValueType::Int => "Int",
            ValueType::Float => "Float",
            ValueType::Double => "Double",
            ValueType::Boolean => "Boolean",
            ValueType::String => "String",
            ValueType::Enumeration(tag) | ValueType::Other(tag) => tag,
        }
    }
}

impl From<std::string::String> for ValueType {
    fn from(tag: std::string::String) -> Self {
        match tag.as_str() {
            "Int" => ValueType::Int,
            "Float" => ValueType::Float,
            "Double" => ValueType::Double,
            "Boolean" => ValueType::Boolean,
            "String" => ValueType::String,
            _ if tag.contains(".EnumType.") => ValueType::Enumeration(tag),
            _ => ValueType::Other(tag),
        }
    }
}

impl From<ValueType> for std::string::String {
    fn from(value_type: ValueType) -> Self {
        value_type.as_str().to_string()
    }
}

/// Numeric constraints of a parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stepsize: Option<f64>,
}

/// A setting, program option or status entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Stable identifier (e.g., "Dishwasher.Option.EcoMode")
    pub key: String,

    /// Declared type, when the service reports one
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,

    /// Current value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// Unit of measurement (e.g., "°C", "seconds")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub constraints: Constraints,
}

impl Parameter {
    /// Create an untyped parameter holding a value
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value_type: None,
            value: Some(value),
            unit: None,
            name: None,
            constraints: Constraints::default(),
        }
    }

    /// Set the declared type
    pub fn with_type(mut self, value_type: ValueType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    /// Set the numeric constraints
    pub fn with_range(mut self, min: f64, max: f64, stepsize: f64) -> Self {
        self.constraints = Constraints {
            min: Some(min),
            max: Some(max),
            stepsize: Some(stepsize),
        };
        self
    }

    /// Set the unit of measurement
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn min(&self) -> Option<f64> {
        self.constraints.min
    }

    pub fn max(&self) -> Option<f64> {
        self.constraints.max
    }

    pub fn stepsize(&self) -> Option<f64> {
        self.constraints.stepsize
    }
}

/// A program with the options it accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "keyed_parameters")]
    pub options: IndexMap<String, Parameter>,
}

impl Program {
    /// Create a program from its options
    pub fn new(key: impl Into<String>, options: impl IntoIterator<Item = Parameter>) -> Self {
        Self {
            key: key.into(),
            name: None,
            options: options.into_iter().map(|o| (o.key.clone(), o)).collect(),
        }
    }
}

/// Everything the client library knows about one appliance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplianceData {
    /// Home Connect appliance id (e.g., "BOSCH-SMV68TX06E-68A40E0E2E4C")
    #[serde(rename = "haId")]
    pub ha_id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub appliance_type: Option<String>,

    #[serde(default = "default_connected")]
    pub connected: bool,

    #[serde(default, deserialize_with = "keyed_parameters")]
    pub settings: IndexMap<String, Parameter>,

    /// `None` when the appliance does not expose programs at all
    #[serde(default, deserialize_with = "keyed_programs")]
    pub available_programs: Option<IndexMap<String, Program>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_program: Option<Program>,

    #[serde(default, deserialize_with = "keyed_parameters")]
    pub status: IndexMap<String, Parameter>,
}

fn default_connected() -> bool {
    true
}

impl ApplianceData {
    /// Create a connected appliance with no settings or programs
    pub fn new(ha_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ha_id: ha_id.into(),
            name: name.into(),
            brand: None,
            appliance_type: None,
            connected: true,
            settings: IndexMap::new(),
            available_programs: None,
            selected_program: None,
            status: IndexMap::new(),
        }
    }

    /// Add a setting
    pub fn with_setting(mut self, setting: Parameter) -> Self {
        self.settings.insert(setting.key.clone(), setting);
        self
    }

    /// Add an available program
    pub fn with_program(mut self, program: Program) -> Self {
        self.available_programs
            .get_or_insert_with(IndexMap::new)
            .insert(program.key.clone(), program);
        self
    }

    /// Add a status entry
    pub fn with_status(mut self, status: Parameter) -> Self {
        self.status.insert(status.key.clone(), status);
        self
    }
}

/// Items stored in maps keyed by their own `key`
trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for Parameter {
    fn key(&self) -> &str {
        &self.key
    }
}

impl Keyed for Program {
    fn key(&self) -> &str {
        &self.key
    }
}

/// Accept either a list of items or a map keyed by item key
#[derive(Deserialize)]
#[serde(untagged)]
enum KeyedShape<T> {
    List(Vec<T>),
    Map(IndexMap<String, T>),
}

impl<T: Keyed> KeyedShape<T> {
    fn into_map(self) -> IndexMap<String, T> {
        match self {
            KeyedShape::List(list) => list
                .into_iter()
                .map(|item| (item.key().to_string(), item))
                .collect(),
            KeyedShape::Map(map) => map,
        }
    }
}

fn keyed_parameters<'de, D>(deserializer: D) -> Result<IndexMap<String, Parameter>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(KeyedShape::<Parameter>::deserialize(deserializer)?.into_map())
}

fn keyed_programs<'de, D>(
    deserializer: D,
) -> Result<Option<IndexMap<String, Program>>, D::Error>
where
    D: Deserializer<'de>,
{
    let programs: Option<KeyedShape<Program>> = Option::deserialize(deserializer)?;
    Ok(programs.map(KeyedShape::into_map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_type_tags() {
        assert_eq!(ValueType::from("Int".to_string()), ValueType::Int);
        assert_eq!(ValueType::from("Boolean".to_string()), ValueType::Boolean);
        assert!(matches!(
            ValueType::from("BSH.Common.EnumType.PowerState".to_string()),
            ValueType::Enumeration(_)
        ));
        assert!(matches!(
            ValueType::from("Something".to_string()),
            ValueType::Other(_)
        ));
    }

    #[test]
    fn test_parameter_from_service_json() {
        let param: Parameter = serde_json::from_value(json!({
            "key": "Dishwasher.Program.Temperature",
            "type": "Int",
            "value": 50,
            "unit": "°C",
            "constraints": {"min": 40, "max": 70, "stepsize": 5}
        }))
        .unwrap();

        assert_eq!(param.value_type, Some(ValueType::Int));
        assert_eq!(param.min(), Some(40.0));
        assert_eq!(param.max(), Some(70.0));
        assert_eq!(param.stepsize(), Some(5.0));
        assert_eq!(param.unit.as_deref(), Some("°C"));
        assert_eq!(param.name, None);
    }

    #[test]
    fn test_parameter_without_type_or_constraints() {
        let param: Parameter =
            serde_json::from_value(json!({"key": "Dishwasher.Option.EcoMode", "value": false}))
                .unwrap();

        assert_eq!(param.value_type, None);
        assert_eq!(param.value, Some(json!(false)));
        assert_eq!(param.min(), None);
    }

    #[test]
    fn test_appliance_data_from_fixture() {
        let data: ApplianceData = serde_json::from_value(json!({
            "haId": "SIEMENS-SN658X06TE-68A40E0E2E4C",
            "name": "Dishwasher",
            "type": "Dishwasher",
            "settings": [
                {"key": "Dishwasher.Option.EcoMode", "type": "Boolean", "value": false}
            ],
            "available_programs": [
                {"key": "Dishwasher.Program.Eco50", "options": [
                    {"key": "Dishwasher.Program.Temperature", "type": "Int", "value": 50}
                ]}
            ],
            "status": {
                "BSH.Common.Status.RemoteControlActive": {
                    "key": "BSH.Common.Status.RemoteControlActive", "value": true
                }
            }
        }))
        .unwrap();

        assert!(data.connected);
        assert_eq!(data.appliance_type.as_deref(), Some("Dishwasher"));
        assert!(data.settings.contains_key("Dishwasher.Option.EcoMode"));
        let programs = data.available_programs.unwrap();
        assert!(programs["Dishwasher.Program.Eco50"]
            .options
            .contains_key("Dishwasher.Program.Temperature"));
        assert!(data.selected_program.is_none());
        assert_eq!(data.status.len(), 1);
    }
}
