use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Render `value` as JSON or YAML, or with `human` for the default format.
    pub fn render<T, F>(self, value: &T, human: F) -> Result<String>
    where
        T: Serialize,
        F: FnOnce(&T) -> String,
    {
        Ok(match self {
            OutputFormat::Human => human(value),
            OutputFormat::Json => serde_json::to_string_pretty(value)?,
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
        })
    }

    pub fn print<T, F>(self, value: &T, human: F) -> Result<()>
    where
        T: Serialize,
        F: FnOnce(&T) -> String,
    {
        let rendered = self.render(value, human)?;
        println!("{}", rendered.trim_end());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn machine_formats_ignore_the_human_renderer() {
        let value = json!({"tier": "auto"});
        let json = OutputFormat::Json.render(&value, |_| "unused".into()).unwrap();
        assert!(json.contains("\"tier\": \"auto\""));
        let yaml = OutputFormat::Yaml.render(&value, |_| "unused".into()).unwrap();
        assert_eq!(yaml.trim(), "tier: auto");
        let human = OutputFormat::Human
            .render(&value, |v| format!("tier={}", v["tier"].as_str().unwrap_or("")))
            .unwrap();
        assert_eq!(human, "tier=auto");
    }
}
