use std::{any::Any, fmt::Debug, sync::Arc};

/// Result tree produced by the interpreter.
///
/// Leaves and structural nodes map directly onto the grammar:
/// * none marker - [`Value::Null`]
/// * literal and range - [`Value::Text`]
/// * sequence - [`Value::Seq`], one entry per child
/// * repeat - [`Value::List`], one entry per iteration
/// * capture - [`Value::Capture`]
///
/// The remaining variants never come out of the grammar itself, they exist
/// so that semantic actions have somewhere to put their results.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Seq(Vec<Value>),
    List(Vec<Value>),
    Capture { label: Arc<str>, value: Box<Value> },
    Custom(Arc<dyn Any + Send + Sync>),
}

impl Value {
    pub fn custom<T: Any + Send + Sync>(value: T) -> Value {
        Value::Custom(Arc::new(value))
    }
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(a) => Some(a),
            _ => None,
        }
    }
    pub fn as_number(&self) -> Option<f64> {
        match *self {
            Value::Number(a) => Some(a),
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(a) => Some(a),
            _ => None,
        }
    }
    /// Children of either a sequence or a repeat.
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(a) | Value::List(a) => Some(a),
            _ => None,
        }
    }
    pub fn as_capture(&self) -> Option<(&str, &Value)> {
        match self {
            Value::Capture { label, value } => Some((label, value)),
            _ => None,
        }
    }
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Custom(a) => a.downcast_ref(),
            _ => None,
        }
    }
    pub fn into_text(self) -> Option<String> {
        match self {
            Value::Text(a) => Some(a),
            _ => None,
        }
    }
    pub fn into_vec(self) -> Option<Vec<Value>> {
        match self {
            Value::Seq(a) | Value::List(a) => Some(a),
            _ => None,
        }
    }
    pub fn into_capture(self) -> Option<(Arc<str>, Value)> {
        match self {
            Value::Capture { label, value } => Some((label, *value)),
            _ => None,
        }
    }
    /// Takes the custom payload out, cloning it if the value is shared.
    pub fn into_custom<T: Any + Send + Sync + Clone>(self) -> Option<T> {
        match self {
            Value::Custom(a) => {
                let arc = a.downcast::<T>().ok()?;
                Some(Arc::try_unwrap(arc).unwrap_or_else(|shared| T::clone(&shared)))
            }
            _ => None,
        }
    }
}

impl PartialEq for Value {
    /// Custom payloads are opaque, they only compare equal to themselves.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (
                Value::Capture { label, value },
                Value::Capture {
                    label: label2,
                    value: value2,
                },
            ) => label == label2 && value == value2,
            (Value::Custom(a), Value::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(a) => write!(f, "{a}"),
            Value::Number(a) => write!(f, "{a}"),
            Value::Text(a) => write!(f, "{a:?}"),
            Value::Seq(a) => {
                let mut tuple = f.debug_tuple("");
                for item in a {
                    tuple.field(item);
                }
                tuple.finish()
            }
            Value::List(a) => f.debug_list().entries(a).finish(),
            Value::Capture { label, value } => f.debug_struct(label).field("value", value).finish(),
            Value::Custom(_) => write!(f, "<custom>"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::Value;

    #[test]
    fn custom_payload_round_trips() {
        let value = Value::custom(vec![1u8, 2, 3]);
        assert_eq!(value.downcast_ref::<Vec<u8>>(), Some(&vec![1, 2, 3]));
        assert_eq!(value.downcast_ref::<String>(), None);

        let shared = value.clone();
        assert_eq!(value, shared);
        assert_eq!(shared.into_custom::<Vec<u8>>(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn sequence_and_list_are_distinct() {
        let seq = Value::Seq(vec!["a".into()]);
        let list = Value::List(vec!["a".into()]);
        assert_ne!(seq, list);
        assert_eq!(seq.as_slice(), list.as_slice());
    }

    #[test]
    fn debug_output() {
        let value = Value::Seq(vec![
            Value::Null,
            Value::List(vec!["x".into(), Value::Number(1.5)]),
        ]);
        assert_eq!(format!("{value:?}"), r#"(null, ["x", 1.5])"#);
    }
}
