use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Response envelope used by every storage endpoint.
///
/// Storage operations never raise: a failure is reported with
/// `success == false` and an optional `error`/`message` text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> StoreResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(message.into()),
        }
    }

    /// The collaborator's explanation of a failure, if it gave one
    pub fn failure_message(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .filter(|msg| !msg.trim().is_empty())
    }

    /// Collapse the envelope into a `Result`, using `fallback` when the
    /// collaborator reported a failure without saying why.
    pub fn into_result(self, fallback: &str) -> Result<T, String> {
        if self.success {
            if let Some(data) = self.data {
                return Ok(data);
            }
        }
        Err(self
            .failure_message()
            .unwrap_or(fallback)
            .to_string())
    }
}

impl StoreResponse<()> {
    pub fn done() -> Self {
        Self {
            success: true,
            data: None,
            message: None,
            error: None,
        }
    }

    /// Like `into_result` for operations that carry no payload
    pub fn into_unit(self, fallback: &str) -> Result<(), String> {
        if self.success {
            Ok(())
        } else {
            Err(self
                .failure_message()
                .unwrap_or(fallback)
                .to_string())
        }
    }
}

/// Payload field that separates "not provided" from "explicitly cleared".
///
/// `Absent` is skipped on the wire (pair it with
/// `#[serde(default, skip_serializing_if = "Field::is_absent")]`),
/// `Null` is sent as JSON `null` and `Value` as the value itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Field<T> {
    #[default]
    Absent,
    Null,
    Value(T),
}

impl<T> Field<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }

    /// Provided values become `Value`, missing ones become `Null`
    pub fn nullable(value: Option<T>) -> Self {
        match value {
            Some(v) => Field::Value(v),
            None => Field::Null,
        }
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            Field::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Value(v) => v.serialize(serializer),
            Field::Absent | Field::Null => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Field::nullable(Option::<T>::deserialize(deserializer)?))
    }
}
