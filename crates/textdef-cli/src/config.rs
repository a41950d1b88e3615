use anyhow::{bail, Context};
use serde::Deserialize;
use serde_json::Value;
use textdef::ParseOptions;

pub struct Config {
    pub max_depth: u32,
}

impl Config {
    pub fn new(mut value: Value) -> anyhow::Result<Self> {
        let Value::Object(fields) = &mut value else {
            bail!("json::Value is not an object!");
        };

        let max_depth = read_field(fields, "maxDepth")?;
        if max_depth == 0 {
            bail!("config.maxDepth must be positive");
        }

        for name in fields.keys() {
            log::warn!("Unknown field config.{name}");
        }

        Ok(Self { max_depth })
    }
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config `{}`", path.display()))?;
        let value = serde_json::from_str(&text)
            .with_context(|| format!("Config `{}` is not valid json", path.display()))?;
        Config::new(value)
    }
    pub fn options(&self) -> ParseOptions {
        ParseOptions::new().with_max_depth(self.max_depth)
    }
}

fn read_field<T: for<'de> Deserialize<'de>>(
    fields: &mut serde_json::Map<String, Value>,
    name: &str,
) -> anyhow::Result<T> {
    let field = fields
        .remove(name)
        .with_context(|| format!("Expected field config.{name}"))?;

    let typename = std::any::type_name::<T>();
    serde_json::from_value::<T>(field.clone())
        .with_context(|| format!("Expected type {typename}, got {field}"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::Config;

    #[test]
    fn reads_max_depth() {
        let config = Config::new(json!({ "maxDepth": 64 })).unwrap();
        assert_eq!(config.max_depth, 64);
        assert_eq!(config.options().max_depth, 64);
    }

    #[test]
    fn rejects_bad_config() {
        assert!(Config::new(json!([])).is_err());
        assert!(Config::new(json!({})).is_err());
        assert!(Config::new(json!({ "maxDepth": "deep" })).is_err());
        assert!(Config::new(json!({ "maxDepth": -1 })).is_err());
        assert!(Config::new(json!({ "maxDepth": 0 })).is_err());
    }
}
