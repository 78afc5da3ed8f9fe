use std::collections::BTreeSet;
use std::env;
use std::fs::read_dir;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;

use log::error;

/// Maximum edit distance for a "did you mean" candidate.
const SUGGESTION_DISTANCE: usize = 2;

/// Names of every executable reachable through the current search path.
pub fn executable_candidates() -> BTreeSet<String> {
    let mut candidates = BTreeSet::new();
    let env_path = match env::var("PATH") {
        Ok(x) => x,
        Err(e) => {
            error!("mysh: error with env PATH: {:?}", e);
            return candidates;
        }
    };
    for p in env_path.split(':') {
        match read_dir(p) {
            Ok(list) => {
                for entry in list.flatten() {
                    let metadata = match entry.metadata() {
                        Ok(x) => x,
                        Err(e) => {
                            error!("mysh: metadata error: {:?}", e);
                            continue;
                        }
                    };
                    if metadata.permissions().mode() & 0o111 == 0 {
                        // not executable
                        continue;
                    }
                    if let Ok(name) = entry.file_name().into_string() {
                        candidates.insert(name);
                    }
                }
            }
            Err(e) => {
                if e.kind() == ErrorKind::NotFound {
                    continue;
                }
                error!("mysh: fs read_dir error: {}: {}", p, e);
            }
        }
    }
    candidates
}

/// Up to `limit` near-name suggestions for a misspelled command, closest
/// first.
pub fn suggest_similar(name: &str, limit: usize) -> Vec<String> {
    let mut scored: Vec<(usize, String)> = executable_candidates()
        .into_iter()
        .filter_map(|candidate| {
            let distance = edit_distance(name, &candidate);
            (distance <= SUGGESTION_DISTANCE).then_some((distance, candidate))
        })
        .collect();
    scored.sort();
    scored.into_iter().map(|(_, c)| c).take(limit).collect()
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

pub fn current_dir() -> String {
    match env::current_dir() {
        Ok(dir) => dir.to_string_lossy().to_string(),
        Err(e) => {
            error!("mysh: env current_dir error: {}", e);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("ls", "ls"), 0);
        assert_eq!(edit_distance("sl", "ls"), 2);
        assert_eq!(edit_distance("grpe", "grep"), 2);
        assert_eq!(edit_distance("eco", "echo"), 1);
        assert_eq!(edit_distance("", "abc"), 3);
    }

    #[test]
    fn test_suggest_similar_finds_near_match() {
        // /bin/ls exists on any Unix test host
        let suggestions = suggest_similar("lz", 3);
        assert!(suggestions.iter().any(|s| s == "ls"));
        assert!(suggestions.len() <= 3);
    }

    #[test]
    fn test_suggest_similar_no_match() {
        let suggestions = suggest_similar("qqqqqqqqqqqqqqqq", 3);
        assert!(suggestions.is_empty());
    }
}
