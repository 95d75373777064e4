//! Synthetic records and their XML document form
//!
//! Wire shape, shared with every tool that reads the archives:
//!
//! ```xml
//! <root>
//!   <var name="id" value="Zx81...32 chars"/>
//!   <var name="level" value="42"/>
//!   <objects>
//!     <object name="QWERTYUIOPASDFGH"/>
//!   </objects>
//! </root>
//! ```

use crate::ids::{self, UniqueIdGenerator, ALPHANUMERIC, UPPERCASE};
use cdp_common::{CdpError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Length of a record identifier
pub const ID_SIZE: usize = 32;

/// Length of an object name
pub const OBJECT_NAME_SIZE: usize = 16;

pub const LEVEL_RANGE: RangeInclusive<u8> = 1..=100;

pub const OBJECTS_RANGE: RangeInclusive<usize> = 1..=10;

const ID_VAR: &str = "id";
const LEVEL_VAR: &str = "level";

/// One generated record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub level: u8,
    pub objects: Vec<RecordObject>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordObject {
    pub name: String,
}

// ============================================================================
// Document Structure
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "root")]
struct RecordDocument {
    #[serde(rename = "var", default)]
    vars: Vec<Var>,
    #[serde(skip_serializing_if = "Option::is_none")]
    objects: Option<ObjectList>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Var {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@value")]
    value: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ObjectList {
    #[serde(rename = "object", default)]
    items: Vec<ObjectEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ObjectEntry {
    #[serde(rename = "@name")]
    name: String,
}

impl RecordDocument {
    fn var(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|var| var.name == name)
            .map(|var| var.value.as_str())
    }
}

impl Record {
    /// Serialize to the indented XML document
    pub fn to_xml(&self) -> Result<String> {
        let document = RecordDocument {
            vars: vec![
                Var {
                    name: ID_VAR.to_string(),
                    value: self.id.clone(),
                },
                Var {
                    name: LEVEL_VAR.to_string(),
                    value: self.level.to_string(),
                },
            ],
            objects: Some(ObjectList {
                items: self
                    .objects
                    .iter()
                    .map(|object| ObjectEntry {
                        name: object.name.clone(),
                    })
                    .collect(),
            }),
        };

        let mut buffer = String::new();
        let mut serializer = quick_xml::se::Serializer::new(&mut buffer);
        serializer.indent(' ', 2);
        document
            .serialize(serializer)
            .map_err(|e| CdpError::Serialization(format!("record {}: {}", self.id, e)))?;

        Ok(buffer)
    }

    /// Parse a record document; `document` names the source in errors
    pub fn from_xml(document: &str, xml: &str) -> Result<Self> {
        let parsed: RecordDocument = quick_xml::de::from_str(xml)
            .map_err(|e| CdpError::parse(document, format!("malformed XML: {}", e)))?;

        let id = parsed
            .var(ID_VAR)
            .ok_or_else(|| CdpError::parse(document, "missing var 'id'"))?
            .to_string();

        let raw_level = parsed
            .var(LEVEL_VAR)
            .ok_or_else(|| CdpError::parse(document, "missing var 'level'"))?;
        let level: u8 = raw_level.trim().parse().map_err(|_| {
            CdpError::parse(document, format!("level '{}' is not an integer", raw_level))
        })?;
        if !LEVEL_RANGE.contains(&level) {
            return Err(CdpError::parse(
                document,
                format!("level {} outside {}..={}", level, LEVEL_RANGE.start(), LEVEL_RANGE.end()),
            ));
        }

        let objects = parsed
            .objects
            .ok_or_else(|| CdpError::parse(document, "missing 'objects' container"))?
            .items
            .into_iter()
            .map(|entry| RecordObject { name: entry.name })
            .collect();

        Ok(Self { id, level, objects })
    }
}

/// Builds random records drawing identifiers from a shared generator
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    id_size: usize,
    object_name_size: usize,
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self {
            id_size: ID_SIZE,
            object_name_size: OBJECT_NAME_SIZE,
        }
    }
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one record with a run-unique id
    pub fn build(&self, ids: &UniqueIdGenerator) -> Result<Record> {
        let id = ids.next(self.id_size, ALPHANUMERIC)?;

        let mut rng = rand::rng();
        let level = rng.random_range(LEVEL_RANGE);
        let object_count = rng.random_range(OBJECTS_RANGE);

        let objects = (0..object_count)
            .map(|_| {
                ids::generate(self.object_name_size, UPPERCASE).map(|name| RecordObject { name })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Record { id, level, objects })
    }

    /// Build one record and serialize it
    pub fn build_document(&self, ids: &UniqueIdGenerator) -> Result<(Record, String)> {
        let record = self.build(ids)?;
        let xml = record.to_xml()?;
        Ok((record, xml))
    }
}
