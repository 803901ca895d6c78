//! PSKReporter spot payload as delivered by the feed.
//!
//! Each MQTT message on `pskr/filter/v2/...` carries one JSON object:
//!
//! ```jsonc
//! {
//!   "sq": 30142870791,        // feed sequence number
//!   "f": 21074653,            // frequency, Hz
//!   "md": "FT8",              // mode
//!   "rp": -5,                 // report (SNR, dB)
//!   "t": 1662407712,          // unix seconds
//!   "sc": "SQ2NIJ",           // sender callsign
//!   "sl": "JO93fn42",         // sender locator
//!   "rc": "CU3AT",            // receiver callsign
//!   "rl": "HM68jp36",         // receiver locator
//!   "sa": 269,                // sender ADIF entity
//!   "ra": 149,                // receiver ADIF entity
//!   "b": "15m"                // band
//! }
//! ```
//!
//! Relays may add a pre-computed great-circle distance `"d"` (km).
//!
//! Fields are kept as loosely-typed JSON values: the feed is not strict about
//! numbers vs. strings, and deciding what is malformed belongs to the
//! normalizer, not to deserialization. Only a non-object payload fails here.

use serde::Deserialize;
use serde::de::Error as _;
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawSpot {
    #[serde(rename = "sq", default)]
    pub sequence: Option<Value>,

    #[serde(rename = "f", default)]
    pub frequency: Option<Value>,

    #[serde(rename = "md", default)]
    pub mode: Option<Value>,

    #[serde(rename = "rp", default)]
    pub report: Option<Value>,

    #[serde(rename = "t", default)]
    pub timestamp: Option<Value>,

    #[serde(rename = "sc", default)]
    pub sender_call: Option<Value>,

    #[serde(rename = "sl", default)]
    pub sender_locator: Option<Value>,

    #[serde(rename = "rc", default)]
    pub receiver_call: Option<Value>,

    #[serde(rename = "rl", default)]
    pub receiver_locator: Option<Value>,

    #[serde(rename = "sa", default)]
    pub sender_region: Option<Value>,

    #[serde(rename = "ra", default)]
    pub receiver_region: Option<Value>,

    #[serde(rename = "b", default)]
    pub band: Option<Value>,

    #[serde(rename = "d", default)]
    pub distance_km: Option<Value>,
}

impl RawSpot {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        // Derived `Deserialize` also accepts sequences, filling fields by
        // position; only objects are spots.
        match serde_json::from_str::<Value>(raw)? {
            obj @ Value::Object(_) => serde_json::from_value(obj),
            other => Err(serde_json::Error::custom(format!(
                "expected a JSON object, got {}",
                kind(&other)
            ))),
        }
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_payload() {
        let raw = r#"{"sq":30142870791,"f":21074653,"md":"FT8","rp":-5,"t":1662407712,
            "sc":"SQ2NIJ","sl":"JO93fn42","rc":"CU3AT","rl":"HM68jp36","sa":269,"ra":149,"b":"15m"}"#;

        let spot = RawSpot::from_json(raw).unwrap();

        assert_eq!(spot.sender_call, Some(json!("SQ2NIJ")));
        assert_eq!(spot.report, Some(json!(-5)));
        assert_eq!(spot.band, Some(json!("15m")));
        assert_eq!(spot.distance_km, None);
    }

    #[test]
    fn missing_fields_are_none_not_errors() {
        let spot = RawSpot::from_json(r#"{"sc":"K1ABC"}"#).unwrap();
        assert!(spot.receiver_call.is_none());
        assert!(spot.timestamp.is_none());
    }

    #[test]
    fn mistyped_fields_survive_deserialization() {
        let spot = RawSpot::from_json(r#"{"rp":"loud","d":"far"}"#).unwrap();
        assert_eq!(spot.report, Some(json!("loud")));
        assert_eq!(spot.distance_km, Some(json!("far")));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(RawSpot::from_json("[1,2,3]").is_err());
        assert!(RawSpot::from_json("not json").is_err());
        assert!(RawSpot::from_json("42").is_err());
        assert!(RawSpot::from_json("null").is_err());
    }

    #[test]
    fn positional_array_is_not_a_spot() {
        let err = RawSpot::from_json(
            r#"[1,21074653,"FT8",-5,1662407712,"A1AA","JO93","B2BB","HM68"]"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("an array"));
    }
}
