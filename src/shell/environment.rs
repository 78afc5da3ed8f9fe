use std::collections::HashMap;
use std::env;

/// The shell's process environment, owned explicitly and passed to every
/// spawn call instead of mutating global process state.
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Snapshot of the parent environment at shell startup.
    pub fn from_process() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: String, value: String) {
        self.vars.insert(name, value);
    }

    pub fn unset(&mut self, name: &str) -> bool {
        self.vars.remove(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.vars.iter()
    }

    /// Expands `$NAME` references against this environment. Unknown
    /// variables expand to the empty string.
    pub fn expand(&self, input: &str) -> String {
        let mut result = String::new();
        let mut chars = input.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek().is_some() {
                let mut var_name = String::new();
                while let Some(&next_char) = chars.peek() {
                    if next_char.is_alphanumeric() || next_char == '_' {
                        var_name.push(next_char);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if var_name.is_empty() {
                    result.push(c);
                } else {
                    result.push_str(self.get(&var_name).unwrap_or_default());
                }
            } else {
                result.push(c);
            }
        }
        result
    }
}
