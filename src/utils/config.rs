use dotenv::dotenv;
use log::warn;
use rustyline::EditMode;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub struct Config {
    pub name: String,
    pub theme: String,
    pub prompt_template: Option<String>,
    pub history_file: PathBuf,
    pub editor_mode: String,
    pub logger_level: String,
    pub logger_dir: PathBuf,
    pub timing_threshold: f64,
}

impl Config {
    fn get_config_dir() -> PathBuf {
        if let Ok(home) = env::var("HOME") {
            PathBuf::from(home).join(".config/mysh")
        } else {
            PathBuf::from("tmp")
        }
    }

    fn default() -> Self {
        let config_dir = Self::get_config_dir();
        Config {
            name: String::from("mysh"),
            theme: String::from("default"),
            prompt_template: None,
            history_file: config_dir.join(".mysh_history"),
            editor_mode: String::from("vi"),
            logger_level: String::from("info"),
            logger_dir: config_dir.join("logs"),
            timing_threshold: 1.0,
        }
    }

    pub fn new() -> Self {
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }

        let mut config = Config::default();

        // rc file first, environment variables override it
        if let Ok(home) = env::var("HOME") {
            let rc = PathBuf::from(home).join(".myshrc");
            config.apply(&Self::parse_rc_file(&rc));
        }

        if let Ok(theme) = env::var("MYSH_THEME") {
            config.theme = theme;
        }
        if let Ok(editor) = env::var("MYSH_EDITOR") {
            config.editor_mode = editor;
        }
        if let Ok(history) = env::var("MYSH_HISTORY") {
            config.history_file = PathBuf::from(history);
        }
        if let Ok(level) = env::var("MYSH_LOG_LEVEL") {
            config.logger_level = level;
        }

        if let Some(parent) = config.history_file.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("failed to create history directory: {}", e);
            }
        }

        config
    }

    fn apply(&mut self, values: &HashMap<String, String>) {
        if let Some(theme) = values.get("THEME") {
            self.theme = theme.clone();
        }
        if let Some(prompt) = values.get("PROMPT") {
            self.prompt_template = Some(prompt.clone());
        }
        if let Some(editor) = values.get("EDITOR_MODE") {
            self.editor_mode = editor.clone();
        }
        if let Some(history) = values.get("HISTORY_FILE") {
            self.history_file = PathBuf::from(history);
        }
        if let Some(level) = values.get("LOG_LEVEL") {
            self.logger_level = level.clone();
        }
        if let Some(threshold) = values.get("TIMING_THRESHOLD") {
            match threshold.parse::<f64>() {
                Ok(t) => self.timing_threshold = t,
                Err(_) => warn!("invalid TIMING_THRESHOLD: {}", threshold),
            }
        }
    }

    /// Parses a `KEY=value` rc file, skipping blanks and `#` comments.
    /// A missing or unreadable file yields an empty map.
    fn parse_rc_file(path: &Path) -> HashMap<String, String> {
        let mut values = HashMap::new();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return values,
        };
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                values.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        values
    }

    pub fn get_edit_mode(&self) -> EditMode {
        match self.editor_mode.to_lowercase().as_str() {
            "emacs" => EditMode::Emacs,
            _ => EditMode::Vi,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_rc_file() {
        let dir = std::env::temp_dir().join(format!("mysh_rc_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rc");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "THEME=dark").unwrap();
        writeln!(file, "TIMING_THRESHOLD = 2.5").unwrap();

        let values = Config::parse_rc_file(&path);
        assert_eq!(values.get("THEME").map(String::as_str), Some("dark"));
        assert_eq!(
            values.get("TIMING_THRESHOLD").map(String::as_str),
            Some("2.5")
        );
        assert_eq!(values.len(), 2);

        let mut config = Config::default();
        config.apply(&values);
        assert_eq!(config.theme, "dark");
        assert_eq!(config.timing_threshold, 2.5);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_parse_rc_file_missing() {
        let values = Config::parse_rc_file(Path::new("/nonexistent/.myshrc"));
        assert!(values.is_empty());
    }
}
