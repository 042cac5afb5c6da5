//! Tool catalog: the immutable registry of every booking operation exposed as a tool.
//!
//! Descriptors are data. The built-in catalog is embedded at compile time and may be
//! replaced by a JSON file of the same shape at startup.

pub mod schema;
pub mod tool_id;

use std::{
    collections::{BTreeMap, HashMap},
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{domain::utils::pascal_case, errors::InvocationError};

pub use schema::{Schema, SchemaViolation};
pub use tool_id::ToolId;

pub const EXPECTED_TOOL_COUNT: usize = 51;
pub const CATALOG_VERSION: u32 = 1;

const BUILTIN_CATALOG: &str = include_str!("../../catalog/neobookings.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Authentication,
    Basket,
    Budget,
    HotelInventory,
    GenericProduct,
    Orders,
    Packages,
    UsersRewards,
    GeographicSearch,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Authentication,
        Category::Basket,
        Category::Budget,
        Category::HotelInventory,
        Category::GenericProduct,
        Category::Orders,
        Category::Packages,
        Category::UsersRewards,
        Category::GeographicSearch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Basket => "basket",
            Self::Budget => "budget",
            Self::HotelInventory => "hotel_inventory",
            Self::GenericProduct => "generic_product",
            Self::Orders => "orders",
            Self::Packages => "packages",
            Self::UsersRewards => "users_rewards",
            Self::GeographicSearch => "geographic_search",
        }
    }

    pub fn expected_count(self) -> usize {
        match self {
            Self::Authentication => 1,
            Self::Basket => 9,
            Self::Budget => 4,
            Self::HotelInventory => 15,
            Self::GenericProduct => 3,
            Self::Orders => 13,
            Self::Packages => 4,
            Self::UsersRewards => 1,
            Self::GeographicSearch => 1,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == value)
            .ok_or_else(|| format!("unknown category '{value}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    #[default]
    Call,
    Authenticate,
}

/// How a tool maps onto the remote booking API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteOperation {
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub kind: OperationKind,
    /// Argument that selects the request envelope language instead of a body field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_param: Option<String>,
    /// Wire names that differ from the PascalCase form of the argument name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl RemoteOperation {
    pub fn language<'a>(&self, arguments: &'a Map<String, Value>, fallback: &'a str) -> &'a str {
        self.language_param
            .as_deref()
            .and_then(|param| arguments.get(param))
            .and_then(Value::as_str)
            .unwrap_or(fallback)
    }

    /// Builds the remote request body from validated arguments and the `Request` envelope.
    pub fn wire_body(&self, arguments: &Map<String, Value>, envelope: Value) -> Value {
        let mut body = Map::new();
        body.insert("Request".to_string(), envelope);

        for (name, value) in arguments {
            if self.language_param.as_deref() == Some(name.as_str()) {
                continue;
            }
            let wire_name = self
                .fields
                .get(name)
                .cloned()
                .unwrap_or_else(|| pascal_case(name));
            body.insert(wire_name, wire_value(value));
        }

        Value::Object(body)
    }
}

fn wire_value(value: &Value) -> Value {
    match value {
        Value::Object(object) => Value::Object(
            object
                .iter()
                .map(|(key, item)| (pascal_case(key), wire_value(item)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(wire_value).collect()),
        _ => value.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: ToolId,
    pub category: Category,
    pub description: String,
    #[serde(default)]
    pub mutating: bool,
    pub operation: RemoteOperation,
    pub input_schema: Schema,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    version: u32,
    tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("catalog is not valid: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported catalog version {0}")]
    UnsupportedVersion(u32),
    #[error("tool {0} is registered more than once")]
    Duplicate(ToolId),
    #[error("catalog is missing tools: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("tool {tool} has an invalid pattern {pattern}")]
    InvalidPattern { tool: ToolId, pattern: String },
}

/// Immutable catalog of tool descriptors with O(1) lookup by name.
#[derive(Debug)]
pub struct Registry {
    descriptors: Vec<ToolDescriptor>,
    index: HashMap<ToolId, usize>,
}

impl Registry {
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn load(override_path: Option<&Path>) -> Result<Self, CatalogError> {
        match override_path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|source| CatalogError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_json(&text)
            }
            None => Self::builtin(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(text)?;
        if file.version != CATALOG_VERSION {
            return Err(CatalogError::UnsupportedVersion(file.version));
        }
        Self::from_descriptors(file.tools)
    }

    pub fn from_descriptors(descriptors: Vec<ToolDescriptor>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(descriptors.len());
        for (position, descriptor) in descriptors.iter().enumerate() {
            if index.insert(descriptor.name, position).is_some() {
                return Err(CatalogError::Duplicate(descriptor.name));
            }
            if let Some(pattern) = descriptor.input_schema.invalid_pattern() {
                return Err(CatalogError::InvalidPattern {
                    tool: descriptor.name,
                    pattern,
                });
            }
        }

        let missing = ToolId::ALL
            .iter()
            .filter(|id| !index.contains_key(id))
            .map(|id| id.as_str())
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(CatalogError::Missing(missing));
        }

        Ok(Self { descriptors, index })
    }

    /// Every descriptor in registration order.
    pub fn list_tools(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, name: &str) -> Result<&ToolDescriptor, InvocationError> {
        let id = name.parse::<ToolId>()?;
        self.descriptor(id)
            .ok_or_else(|| InvocationError::unknown_tool(name))
    }

    pub fn descriptor(&self, id: ToolId) -> Option<&ToolDescriptor> {
        self.index
            .get(&id)
            .and_then(|position| self.descriptors.get(*position))
    }

    pub fn count_by_category(&self) -> BTreeMap<Category, usize> {
        let mut counts = BTreeMap::new();
        for descriptor in &self.descriptors {
            *counts.entry(descriptor.category).or_insert(0) += 1;
        }
        counts
    }

    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &ToolDescriptor> {
        self.descriptors
            .iter()
            .filter(move |descriptor| descriptor.category == category)
    }
}
