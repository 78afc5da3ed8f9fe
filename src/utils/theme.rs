use std::collections::HashMap;
use std::process::Command;

use chrono::Local;
use colored::Colorize;

use crate::utils::config::Config;
use crate::utils::path;

pub struct Theme {
    pub error_symbol: String,
    pub welcome_message: String,
    pub exit_message: String,
    pub error_style: Box<dyn Fn(String) -> String>,
    pub success_style: Box<dyn Fn(String) -> String>,
    pub warning_style: Box<dyn Fn(String) -> String>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            error_symbol: "✗".red().to_string(),
            welcome_message: "Welcome to mysh. Type 'help' for builtin commands."
                .bright_cyan()
                .to_string(),
            exit_message: "Bye.".bright_blue().to_string(),
            error_style: Box::new(|s| s.bright_red().to_string()),
            success_style: Box::new(|s| s.bright_green().to_string()),
            warning_style: Box::new(|s| s.bright_yellow().to_string()),
        }
    }
}

pub fn load_theme(theme_name: &str) -> Theme {
    match theme_name {
        "plain" => Theme {
            error_symbol: "err".to_string(),
            welcome_message: "Welcome to mysh.".to_string(),
            exit_message: "Bye.".to_string(),
            error_style: Box::new(|s| s),
            success_style: Box::new(|s| s),
            warning_style: Box::new(|s| s),
        },
        _ => Theme::default(),
    }
}

/// Renders the prompt string for one control-loop iteration. Variants are
/// resolved by name once at configuration load, never per render.
pub trait PromptProvider {
    fn render(&self) -> String;
}

/// `mysh:<cwd>$ ` with the shell name styled per the theme.
struct DefaultPrompt {
    name: String,
}

impl PromptProvider for DefaultPrompt {
    fn render(&self) -> String {
        format!(
            "{}:{}$ ",
            self.name.bright_cyan(),
            path::current_dir().bright_blue()
        )
    }
}

/// User template with `{cwd}`, `{time}` and `{git}` placeholders.
struct TemplatePrompt {
    template: String,
}

impl PromptProvider for TemplatePrompt {
    fn render(&self) -> String {
        let mut prompt = self.template.clone();
        if prompt.contains("{cwd}") {
            prompt = prompt.replace("{cwd}", &path::current_dir());
        }
        if prompt.contains("{time}") {
            let now = Local::now().format("%H:%M:%S").to_string();
            prompt = prompt.replace("{time}", &now);
        }
        if prompt.contains("{git}") {
            prompt = prompt.replace("{git}", &git_branch());
        }
        prompt
    }
}

fn git_branch() -> String {
    let output = Command::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .output();
    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).trim().to_string(),
        _ => String::new(),
    }
}

/// Named prompt providers: the built-in variants plus anything a plugin
/// registers before configuration resolves.
pub struct PromptRegistry {
    providers: HashMap<String, Box<dyn PromptProvider>>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &str, provider: Box<dyn PromptProvider>) {
        self.providers.insert(name.to_string(), provider);
    }

    /// Picks the provider for this configuration: an explicit `PROMPT`
    /// template wins, then a registered provider matching the theme name,
    /// then the default.
    pub fn resolve(mut self, config: &Config) -> Box<dyn PromptProvider> {
        if let Some(template) = &config.prompt_template {
            return Box::new(TemplatePrompt {
                template: template.clone(),
            });
        }
        if let Some(provider) = self.providers.remove(&config.theme) {
            return provider;
        }
        Box::new(DefaultPrompt {
            name: config.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_prompt_cwd() {
        let prompt = TemplatePrompt {
            template: "[{cwd}]$ ".to_string(),
        };
        let rendered = prompt.render();
        assert!(rendered.starts_with('['));
        assert!(rendered.contains(&path::current_dir()));
    }

    #[test]
    fn test_template_prompt_literal() {
        let prompt = TemplatePrompt {
            template: "mysh$ ".to_string(),
        };
        assert_eq!(prompt.render(), "mysh$ ");
    }

    #[test]
    fn test_registry_resolves_registered_variant() {
        struct Fixed;
        impl PromptProvider for Fixed {
            fn render(&self) -> String {
                ">> ".to_string()
            }
        }

        let mut registry = PromptRegistry::new();
        registry.register("fixed", Box::new(Fixed));
        let mut config = Config::new();
        config.theme = "fixed".to_string();
        config.prompt_template = None;
        let provider = registry.resolve(&config);
        assert_eq!(provider.render(), ">> ");
    }
}
