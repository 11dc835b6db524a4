//! State snapshot updates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ProtocolError, ProtocolResult};

/// The latest agent state: key to markdown text.
pub type StateSnapshot = BTreeMap<String, String>;

/// Keys carried by one `state` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateDelta(pub BTreeMap<String, String>);

impl StateDelta {
    /// Build from an event's `data`, which must be a JSON object.
    ///
    /// String values are taken verbatim; anything else is kept as its
    /// compact JSON text.
    pub fn from_value(data: Value) -> ProtocolResult<Self> {
        let Value::Object(map) = data else {
            return Err(ProtocolError::malformed(
                "state",
                "data must be an object of string values",
            ));
        };

        let entries = map
            .into_iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, text)
            })
            .collect();
        Ok(Self(entries))
    }

    /// Key-wise overwrite into `snapshot`. No deep merge.
    pub fn merge_into(self, snapshot: &mut StateSnapshot) {
        snapshot.extend(self.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
