use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// Mutable view of one session's environment.
///
/// The environment contains:
/// - `vars`: the variables visible to expansion and to executed commands.
///   This is the configured snapshot only; the process environment is never consulted.
/// - `current_dir`: the working directory for command execution.
/// - `should_exit`: a flag the read-eval loop checks to know when to terminate.
#[derive(Debug, Clone)]
pub struct Environment {
    pub vars: HashMap<String, String>,
    pub current_dir: PathBuf,
    pub should_exit: bool,
}

impl Environment {
    /// Start a session environment from a variable snapshot.
    ///
    /// `current_dir` starts at the process working directory.
    pub fn new(vars: HashMap<String, String>) -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars,
            current_dir,
            should_exit: false,
        }
    }

    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Variables sorted by name, for stable listings.
    pub fn sorted_vars(&self) -> Vec<(&str, &str)> {
        let mut vars: Vec<_> = self
            .vars
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        vars.sort_unstable();
        vars
    }
}

/// Snapshot of the real process environment. Variables that are not valid
/// Unicode are left out.
pub fn process_vars() -> HashMap<String, String> {
    stdenv::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_set_and_get_var() {
        let mut env = Environment::new(HashMap::new());

        assert_eq!(env.get_var("KEY"), None);
        env.set_var("KEY", "VALUE");
        assert_eq!(env.get_var("KEY"), Some("VALUE".to_string()));
    }

    #[test]
    fn test_env_never_falls_back_to_process_env() {
        assert!(process_vars().contains_key("PATH"));
        let env = Environment::new(HashMap::new());
        assert_eq!(env.get_var("PATH"), None);
    }

    #[test]
    fn test_sorted_vars() {
        let vars = HashMap::from([("B".to_string(), "2".to_string()), ("A".to_string(), "1".to_string())]);
        let env = Environment::new(vars);
        assert_eq!(env.sorted_vars(), vec![("A", "1"), ("B", "2")]);
    }
}
