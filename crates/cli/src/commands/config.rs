use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use millwork_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    let fields: &[(&str, String, Option<&str>)] = &[
        ("database.url", config.database.url.clone(), Some("MILLWORK_DATABASE_URL")),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            Some("MILLWORK_DATABASE_MAX_CONNECTIONS"),
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            Some("MILLWORK_DATABASE_TIMEOUT_SECS"),
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            Some("MILLWORK_SERVER_BIND_ADDRESS"),
        ),
        ("server.port", config.server.port.to_string(), Some("MILLWORK_SERVER_PORT")),
        (
            "sessions.token_ttl_minutes",
            config.sessions.token_ttl_minutes.to_string(),
            Some("MILLWORK_SESSION_TTL_MINUTES"),
        ),
        ("logging.level", config.logging.level.clone(), Some("MILLWORK_LOG_LEVEL")),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            Some("MILLWORK_LOG_FORMAT"),
        ),
    ];

    for (key, value, env_var) in fields {
        lines.push(render_line(
            key,
            value,
            field_source(key, *env_var, config_file_doc.as_ref(), config_file_path.as_deref()),
        ));
    }

    lines.join("\n")
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("  {key} = {value}  [{source}]")
}

fn detect_config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("MILLWORK_CONFIG") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }
    let default = PathBuf::from("millwork.toml");
    default.exists().then_some(default)
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key: &str,
    env_var: Option<&str>,
    doc: Option<&Value>,
    path: Option<&Path>,
) -> String {
    if let Some(var) = env_var {
        if env::var(var).is_ok() {
            return format!("env:{var}");
        }
    }

    if let (Some(doc), Some(path)) = (doc, path) {
        let mut cursor = Some(doc);
        for segment in key.split('.') {
            cursor = cursor.and_then(|value| value.get(segment));
        }
        if cursor.is_some() {
            return format!("file:{}", path.display());
        }
    }

    "default".to_string()
}

#[cfg(test)]
mod tests {
    use super::run;

    #[test]
    fn renders_every_config_section() {
        let output = run();
        for key in ["database.url", "server.port", "sessions.token_ttl_minutes", "logging.level"] {
            assert!(output.contains(key), "missing {key} in:\n{output}");
        }
    }
}
