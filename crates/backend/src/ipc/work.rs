use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Opaque biometric template blob.
///
/// The worker never looks inside a template; only the matching engine does.
/// On the wire a template is a lowercase hex string.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Template(Vec<u8>);

impl Template {
  pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
    Self(bytes.into())
  }

  pub fn from_hex(encoded: &str) -> Result<Self, hex::FromHexError> {
    hex::decode(encoded.trim()).map(Self)
  }

  pub fn to_hex(&self) -> String {
    hex::encode(&self.0)
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl From<Vec<u8>> for Template {
  fn from(bytes: Vec<u8>) -> Self {
    Self(bytes)
  }
}

impl From<&[u8]> for Template {
  fn from(bytes: &[u8]) -> Self {
    Self(bytes.to_vec())
  }
}

// Templates can be several KiB; keep debug output short.
impl fmt::Debug for Template {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let prefix = hex::encode(&self.0[..self.0.len().min(8)]);
    write!(f, "Template({} bytes, {}..)", self.0.len(), prefix)
  }
}

impl Serialize for Template {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.to_hex())
  }
}

impl<'de> Deserialize<'de> for Template {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    Template::from_hex(&encoded).map_err(serde::de::Error::custom)
  }
}

/// A unit of identification work handed to a worker.
///
/// `items` is the shared candidate database; the worker only searches the
/// index range carried by the `do` command. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
  pub id: String,
  pub items: Vec<Template>,
  pub feature: Template,
}

impl WorkItem {
  pub fn new(id: impl Into<String>, items: Vec<Template>, feature: Template) -> Self {
    Self {
      id: id.into(),
      items,
      feature,
    }
  }
}

/// Identity of a worker, echoed in every report it emits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  /// Generate a unique, time-ordered worker id
  pub fn generate() -> Self {
    Self(format!("worker-{}", uuid::Uuid::now_v7()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for WorkerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}
