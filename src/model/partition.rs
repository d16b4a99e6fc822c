/*!
Partition specs describe how partition values are derived from source
columns: an ordered list of fields, each naming a source column and the
[Transform] applied to it.
*/

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// A transform applied to a source column to derive a partition value.
///
/// The wire form is the transform name; `bucket[N]` and `truncate[W]` carry
/// their parameter in brackets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Maps every value to null.
    Void,
    /// The source value itself.
    Identity,
    /// Years since 1970.
    Year,
    /// Months since 1970-01.
    Month,
    /// Days since 1970-01-01.
    Day,
    /// Hours since 1970-01-01 00:00.
    Hour,
    /// Hash of the value modulo the bucket count.
    Bucket(u32),
    /// The value truncated to the given width.
    Truncate(u32),
}

lazy_static! {
    static ref PARAMETERIZED: Regex =
        Regex::new(r"^(?P<name>bucket|truncate)\[(?P<arg>\d+)\]$").unwrap();
}

impl FromStr for Transform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "void" => return Ok(Transform::Void),
            "identity" => return Ok(Transform::Identity),
            "year" => return Ok(Transform::Year),
            "month" => return Ok(Transform::Month),
            "day" => return Ok(Transform::Day),
            "hour" => return Ok(Transform::Hour),
            _ => {}
        }
        let caps = PARAMETERIZED
            .captures(s)
            .ok_or_else(|| format!("unrecognized transform {s:?}"))?;
        let arg = caps["arg"]
            .parse::<u32>()
            .map_err(|_| format!("parameter of transform {s:?} is out of range"))?;
        if &caps["name"] == "bucket" {
            Ok(Transform::Bucket(arg))
        } else {
            Ok(Transform::Truncate(arg))
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Void => write!(f, "void"),
            Transform::Identity => write!(f, "identity"),
            Transform::Year => write!(f, "year"),
            Transform::Month => write!(f, "month"),
            Transform::Day => write!(f, "day"),
            Transform::Hour => write!(f, "hour"),
            Transform::Bucket(count) => write!(f, "bucket[{count}]"),
            Transform::Truncate(width) => write!(f, "truncate[{width}]"),
        }
    }
}

impl Serialize for Transform {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Transform {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

/// One field of a partition spec: which column feeds it, how the value is
/// derived, and the name partition tuples use for it.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct PartitionField {
    /// Id of the source column in the table schema.
    pub source_id: i32,
    /// Id of this partition field, unique across all specs of the table.
    pub field_id: i32,
    /// Name of the partition field.
    pub name: String,
    /// How the partition value is derived from the source column.
    pub transform: Transform,
}

/// An identified list of partition fields. New tables start with spec 0 and
/// no fields.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct PartitionSpec {
    /// Id of the spec.
    pub spec_id: i32,
    /// The partition fields, in order.
    pub fields: Vec<PartitionField>,
}

impl PartitionSpec {
    /// The empty spec new tables start with.
    pub fn unpartitioned() -> Self {
        PartitionSpec {
            spec_id: 0,
            fields: vec![],
        }
    }

    /// The highest partition field id in the spec, 0 when unpartitioned.
    pub fn highest_field_id(&self) -> i32 {
        self.fields
            .iter()
            .map(|field| field.field_id)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_string_forms() {
        let cases = [
            ("void", Transform::Void),
            ("identity", Transform::Identity),
            ("year", Transform::Year),
            ("month", Transform::Month),
            ("day", Transform::Day),
            ("hour", Transform::Hour),
            ("bucket[16]", Transform::Bucket(16)),
            ("truncate[4]", Transform::Truncate(4)),
        ];
        for (text, transform) in cases {
            assert_eq!(Ok(transform), text.parse());
            assert_eq!(text, transform.to_string());
        }
    }

    #[test]
    fn test_transform_rejects_malformed_input() {
        for text in ["", "sort", "bucket", "bucket[]", "bucket[-1]", "truncate[1.5]"] {
            assert!(text.parse::<Transform>().is_err(), "{text:?} should not parse");
        }
    }

    #[test]
    fn test_partition_field_wire_format() {
        let data = r#"
            {
                "source-id": 4,
                "field-id": 1000,
                "name": "ts_day",
                "transform": "day"
            }
        "#;
        let field: PartitionField = serde_json::from_str(data).unwrap();
        assert_eq!(4, field.source_id);
        assert_eq!(1000, field.field_id);
        assert_eq!("ts_day", field.name);
        assert_eq!(Transform::Day, field.transform);

        let json = serde_json::to_string(&field).unwrap();
        let reparsed: PartitionField = serde_json::from_str(&json).unwrap();
        assert_eq!(field, reparsed);
    }

    #[test]
    fn test_unpartitioned() {
        let spec = PartitionSpec::unpartitioned();
        assert_eq!(0, spec.spec_id);
        assert!(spec.fields.is_empty());
        assert_eq!(0, spec.highest_field_id());
    }
}
