//! Compiler configuration: include paths, command-line macros, and
//! the pipeline's stage off-switches.

use std::path::PathBuf;

/// A `-D NAME[=VAL]` command-line macro. Value defaults to `"1"` when
/// omitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLineDefine {
    pub name: String,
    pub value: String,
}

impl CommandLineDefine {
    /// Parses a raw `-D` argument of the form `NAME` or `NAME=VALUE`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let mut parts = raw.splitn(2, '=');
        let name = parts.next().unwrap_or("").to_string();
        if name.is_empty() || !name.chars().next().unwrap().is_alphabetic() && !name.starts_with('_') {
            return Err(format!("invalid macro name in '-D {raw}'"));
        }
        let value = parts.next().unwrap_or("1").to_string();
        Ok(CommandLineDefine { name, value })
    }
}

/// Configuration for one compilation, built up from CLI flags or from
/// an embedding tool's own defaults.
#[derive(Debug, Clone, Default)]
pub struct CompilerConfig {
    pub include_dirs: Vec<PathBuf>,
    pub defines: Vec<CommandLineDefine>,
    pub compat_preprocessor: bool,
    pub no_sema: bool,
    pub no_consteval: bool,
    pub verbose: bool,
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    pub fn with_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    pub fn with_include_dirs(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.include_dirs.extend(dirs);
        self
    }

    pub fn with_define(mut self, define: CommandLineDefine) -> Self {
        self.defines.push(define);
        self
    }

    pub fn with_compat_preprocessor(mut self, compat: bool) -> Self {
        self.compat_preprocessor = compat;
        self
    }

    pub fn with_no_sema(mut self, no_sema: bool) -> Self {
        self.no_sema = no_sema;
        self
    }

    pub fn with_no_consteval(mut self, no_consteval: bool) -> Self {
        self.no_consteval = no_consteval;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn define_pairs(&self) -> Vec<(String, String)> {
        self.defines
            .iter()
            .map(|d| (d.name.clone(), d.value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_define() {
        let d = CommandLineDefine::parse("DEBUG").unwrap();
        assert_eq!(d.name, "DEBUG");
        assert_eq!(d.value, "1");
    }

    #[test]
    fn parses_valued_define() {
        let d = CommandLineDefine::parse("LEVEL=3").unwrap();
        assert_eq!(d.name, "LEVEL");
        assert_eq!(d.value, "3");
    }

    #[test]
    fn rejects_empty_name() {
        assert!(CommandLineDefine::parse("=3").is_err());
    }

    #[test]
    fn builder_accumulates_config() {
        let config = CompilerConfig::new()
            .with_include_dir("/usr/include/safec")
            .with_define(CommandLineDefine::parse("X=1").unwrap())
            .with_compat_preprocessor(true);
        assert_eq!(config.include_dirs.len(), 1);
        assert_eq!(config.defines.len(), 1);
        assert!(config.compat_preprocessor);
    }
}
