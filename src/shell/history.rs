/// In-memory command history with `!` expansion. Persistence across
/// sessions is handled separately by the readline file history.
pub struct HistoryManager {
    entries: Vec<String>,
}

impl HistoryManager {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, line: &str) {
        self.entries.push(line.to_string());
    }

    /// 1-based lookup, matching the numbering users see.
    pub fn get(&self, index: usize) -> Option<&str> {
        if index == 0 {
            return None;
        }
        self.entries.get(index - 1).map(String::as_str)
    }

    /// Pure transform resolving `!!`, `!N` and `!prefix` references.
    /// Returns the line unchanged when no reference matches.
    pub fn expand(&self, line: &str) -> String {
        let trimmed = line.trim();
        if trimmed == "!!" {
            return self.entries.last().cloned().unwrap_or_default();
        }
        if let Some(rest) = trimmed.strip_prefix('!') {
            if rest.is_empty() {
                return line.to_string();
            }
            if let Ok(index) = rest.parse::<usize>() {
                return self.get(index).unwrap_or(line).to_string();
            }
            for entry in self.entries.iter().rev() {
                if entry.starts_with(rest) {
                    return entry.clone();
                }
            }
        }
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> HistoryManager {
        let mut history = HistoryManager::new();
        history.add("ls -l");
        history.add("grep foo bar.txt");
        history.add("echo done");
        history
    }

    #[test]
    fn test_expand_double_bang() {
        assert_eq!(history().expand("!!"), "echo done");
        assert_eq!(HistoryManager::new().expand("!!"), "");
    }

    #[test]
    fn test_expand_index() {
        let history = history();
        assert_eq!(history.expand("!1"), "ls -l");
        assert_eq!(history.expand("!3"), "echo done");
        // out of range leaves the line alone
        assert_eq!(history.expand("!9"), "!9");
        assert_eq!(history.expand("!0"), "!0");
    }

    #[test]
    fn test_expand_prefix() {
        let history = history();
        assert_eq!(history.expand("!grep"), "grep foo bar.txt");
        assert_eq!(history.expand("!e"), "echo done");
        assert_eq!(history.expand("!nope"), "!nope");
    }

    #[test]
    fn test_no_reference_passthrough() {
        assert_eq!(history().expand("ls -l"), "ls -l");
    }
}
