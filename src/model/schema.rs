/*!
A table's schema is a list of named columns, represented by [Schema].
All data types are either [primitives](PrimitiveType) or nested types, which
are [ListType], [MapType], or [StructType]. A table [Schema] is also a
[StructType].
*/

use std::cmp;
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, PartialEq, Eq, Clone)]
/// Primitive types within a schema. The wire form is the type name;
/// `decimal(p,s)` and `fixed[n]` carry their parameters in the string.
pub enum PrimitiveType {
    /// True or False
    Boolean,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    /// 32-bit IEEE 754 floating point.
    Float,
    /// 64-bit IEEE 754 floating point.
    Double,
    /// Fixed point decimal
    Decimal {
        /// The number of digits in the number.
        precision: i32,
        /// The number of digits to the right of the decimal point.
        scale: u8,
    },
    /// Calendar date without timezone or time.
    Date,
    /// Time of day without date or timezone.
    Time,
    /// Timestamp without timezone
    Timestamp,
    /// Timestamp with timezone
    Timestamptz,
    /// Arbitrary-length character sequences
    String,
    /// Universally Unique Identifiers
    Uuid,
    /// Fixed length byte array
    Fixed(u64),
    /// Arbitrary-length byte array.
    Binary,
}

lazy_static! {
    static ref DECIMAL: Regex = Regex::new(r"^decimal\((?P<p>\d+),\s*(?P<s>\d+)\)$").unwrap();
    static ref FIXED: Regex = Regex::new(r"^fixed\[(?P<n>\d+)\]$").unwrap();
}

/// Parse the wire form of a primitive type. Malformed `decimal`/`fixed`
/// strings are errors; any other unrecognized name maps to
/// [PrimitiveType::String].
fn parse_primitive(s: &str) -> Result<PrimitiveType, String> {
    if let Some(caps) = DECIMAL.captures(s) {
        let precision = caps["p"]
            .parse::<i32>()
            .map_err(|_| format!("precision of {s:?} is out of range"))?;
        let scale = caps["s"]
            .parse::<u8>()
            .map_err(|_| format!("scale of {s:?} is out of range"))?;
        return Ok(PrimitiveType::Decimal { precision, scale });
    }
    if let Some(caps) = FIXED.captures(s) {
        let length = caps["n"]
            .parse::<u64>()
            .map_err(|_| format!("length of {s:?} is out of range"))?;
        return Ok(PrimitiveType::Fixed(length));
    }
    if s.starts_with("decimal") || s.starts_with("fixed") {
        return Err(format!("malformed type string {s:?}"));
    }
    Ok(match s {
        "boolean" => PrimitiveType::Boolean,
        "int" => PrimitiveType::Int,
        "long" => PrimitiveType::Long,
        "float" => PrimitiveType::Float,
        "double" => PrimitiveType::Double,
        "date" => PrimitiveType::Date,
        "time" => PrimitiveType::Time,
        "timestamp" => PrimitiveType::Timestamp,
        "timestamptz" => PrimitiveType::Timestamptz,
        "uuid" => PrimitiveType::Uuid,
        "binary" => PrimitiveType::Binary,
        _ => PrimitiveType::String,
    })
}

impl Serialize for PrimitiveType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Display emits the canonical wire string for every variant
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PrimitiveType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_primitive(&s).map_err(de::Error::custom)
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PrimitiveType::Boolean => write!(f, "boolean"),
            PrimitiveType::Int => write!(f, "int"),
            PrimitiveType::Long => write!(f, "long"),
            PrimitiveType::Float => write!(f, "float"),
            PrimitiveType::Double => write!(f, "double"),
            PrimitiveType::Decimal { precision, scale } => {
                write!(f, "decimal({precision},{scale})")
            }
            PrimitiveType::Date => write!(f, "date"),
            PrimitiveType::Time => write!(f, "time"),
            PrimitiveType::Timestamp => write!(f, "timestamp"),
            PrimitiveType::Timestamptz => write!(f, "timestamptz"),
            PrimitiveType::String => write!(f, "string"),
            PrimitiveType::Uuid => write!(f, "uuid"),
            PrimitiveType::Fixed(l) => write!(f, "fixed[{l}]"),
            PrimitiveType::Binary => write!(f, "binary"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(untagged)]
/// A union type of all allowed schema types.
pub enum Type {
    /// All the primitive types
    Primitive(PrimitiveType),
    /// A struct type
    Struct(StructType),
    /// A list type
    List(ListType),
    /// A map type
    Map(MapType),
}

impl Type {
    /// The highest field id assigned inside this type, 0 when it carries none.
    pub fn highest_field_id(&self) -> i32 {
        match self {
            Type::Primitive(_) => 0,
            Type::Struct(fields) => fields.highest_field_id(),
            Type::List(list) => cmp::max(list.element_id, list.element.highest_field_id()),
            Type::Map(map) => [
                map.key_id,
                map.value_id,
                map.key.highest_field_id(),
                map.value.highest_field_id(),
            ]
            .into_iter()
            .max()
            .unwrap_or(0),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Primitive(primitive) => write!(f, "{}", primitive),
            Type::Struct(_) => write!(f, "struct"),
            Type::List(_) => write!(f, "list"),
            Type::Map(_) => write!(f, "map"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(tag = "type", rename = "struct")]
/// A struct is a tuple of typed values. Each field in the tuple is named and
/// has an integer id that is unique in the table schema. Each field can be
/// either optional or required. Fields may be any type and may carry an
/// optional doc string.
pub struct StructType {
    /// The fields of the struct.
    pub fields: Vec<StructField>,
}

impl StructType {
    /// Get the struct field carrying the given id.
    pub fn get(&self, id: i32) -> Option<&StructField> {
        self.fields.iter().find(|field| field.id == id)
    }

    /// The highest field id assigned in this struct, including nested types.
    pub fn highest_field_id(&self) -> i32 {
        self.fields
            .iter()
            .map(|field| cmp::max(field.id, field.field_type.highest_field_id()))
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
/// A named field within a struct.
pub struct StructField {
    /// Unique id
    pub id: i32,
    /// Field name
    pub name: String,
    /// Optional or required, meaning that values can (or can not) be null
    pub required: bool,
    /// Field can have any type
    #[serde(rename = "type")]
    pub field_type: Type,
    /// Fields can have an optional comment or doc string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
/// Names and types of fields in a table.
pub struct Schema {
    /// Identifier of the schema
    pub schema_id: i32,
    /// Set of primitive fields that identify rows in a table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier_field_ids: Option<Vec<i32>>,

    #[serde(flatten)]
    /// The struct fields
    pub fields: StructType,
}

impl Schema {
    /// Build a schema with the given id from a list of fields.
    pub fn from_fields(schema_id: i32, fields: Vec<StructField>) -> Self {
        Schema {
            schema_id,
            identifier_field_ids: None,
            fields: StructType { fields },
        }
    }

    /// The highest field id assigned in the schema, including nested types.
    pub fn highest_field_id(&self) -> i32 {
        self.fields.highest_field_id()
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case", tag = "type", rename = "list")]
/// A schema type that contains list elements.
pub struct ListType {
    /// Unique identifier for the element
    pub element_id: i32,

    /// If the element is mandatory.
    pub element_required: bool,

    /// The type of the element.
    pub element: Box<Type>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case", tag = "type", rename = "map")]
/// A schema type that contains map elements. A map is a collection of
/// key-value pairs with a key type and a value type. Map keys are required
/// and map values can be either optional or required. Both may be any type,
/// including nested types.
pub struct MapType {
    /// Unique key field id
    pub key_id: i32,
    /// Type of the map key
    pub key: Box<Type>,
    /// Unique value field id
    pub value_id: i32,
    /// Indicates if the value is required.
    pub value_required: bool,
    /// Type of the value.
    pub value: Box<Type>,
}
