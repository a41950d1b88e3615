use std::{collections::BTreeMap, fmt::Display};

/// Decoded JSON document.
///
/// Numbers are always `f64`, objects keep the last value of a duplicated key.
#[derive(Clone, Debug, PartialEq)]
pub enum Json {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Json>),
    Object(BTreeMap<String, Json>),
}

impl From<serde_json::Value> for Json {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Json::Null,
            serde_json::Value::Bool(a) => Json::Bool(a),
            serde_json::Value::Number(a) => Json::Number(a.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(a) => Json::String(a),
            serde_json::Value::Array(a) => Json::Array(a.into_iter().map(Json::from).collect()),
            serde_json::Value::Object(a) => {
                Json::Object(a.into_iter().map(|(k, v)| (k, Json::from(v))).collect())
            }
        }
    }
}

impl From<Json> for serde_json::Value {
    fn from(value: Json) -> Self {
        // integers above 2^53 are not exact anyway
        const MAX_EXACT: f64 = 9007199254740992.0;

        match value {
            Json::Null => serde_json::Value::Null,
            Json::Bool(a) => serde_json::Value::Bool(a),
            Json::Number(a) if a.fract() == 0.0 && a.abs() <= MAX_EXACT => {
                serde_json::Value::from(a as i64)
            }
            Json::Number(a) => serde_json::Number::from_f64(a)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Json::String(a) => serde_json::Value::String(a),
            Json::Array(a) => serde_json::Value::Array(a.into_iter().map(Into::into).collect()),
            Json::Object(a) => {
                serde_json::Value::Object(a.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl Display for Json {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = serde_json::Value::from(self.clone());
        Display::fmt(&value, f)
    }
}

#[test]
fn test_serde_conversion() {
    let text = r#"{"a": [1, 2.5, -0.25, true, null], "b": {"c": "d"}}"#;
    let value: serde_json::Value = serde_json::from_str(text).unwrap();

    let json = Json::from(value.clone());
    let Json::Object(fields) = &json else {
        panic!("expected an object");
    };
    assert_eq!(
        fields["a"],
        Json::Array(vec![
            Json::Number(1.0),
            Json::Number(2.5),
            Json::Number(-0.25),
            Json::Bool(true),
            Json::Null,
        ])
    );

    assert_eq!(serde_json::Value::from(json.clone()), value);
    assert_eq!(json.to_string(), r#"{"a":[1,2.5,-0.25,true,null],"b":{"c":"d"}}"#);
}
