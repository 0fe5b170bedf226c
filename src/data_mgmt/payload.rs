use serde::Serialize;

use super::models::{Reading, Value, ValueKind};

/// Event sent downstream for each accepted reading
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub device_name: String,
    pub origin: i64,
    pub readings: Vec<ReadingPayload>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadingPayload {
    pub device_name: String,
    pub resource_name: String,
    pub value_type: ValueKind,
    pub value: Value,
    pub origin: i64,
}

impl EventPayload {
    pub fn from_reading(reading: Reading, origin: i64) -> Self {
        let value_type = reading.value.kind();
        Self {
            device_name: reading.device_name.clone(),
            origin,
            readings: vec![ReadingPayload {
                device_name: reading.device_name,
                resource_name: reading.resource_name,
                value_type,
                value: reading.value,
                origin,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_event_payload_json() {
        let reading = Reading::new("device-1", "temp", Value::Float64(23.5));
        let payload = EventPayload::from_reading(reading, 1_700_000_000_000_000_000);

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "deviceName": "device-1",
                "origin": 1_700_000_000_000_000_000i64,
                "readings": [{
                    "deviceName": "device-1",
                    "resourceName": "temp",
                    "valueType": "Float64",
                    "value": 23.5,
                    "origin": 1_700_000_000_000_000_000i64
                }]
            })
        );
    }

    #[test]
    fn test_string_reading_keeps_text() {
        let reading = Reading::new("d", "label", Value::String("{\"a\":1}".into()));
        let payload = EventPayload::from_reading(reading, 1);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["readings"][0]["value"], json!("{\"a\":1}"));
        assert_eq!(json["readings"][0]["valueType"], json!("String"));
    }
}
