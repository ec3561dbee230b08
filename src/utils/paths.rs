use std::path::PathBuf;

/// Environment variable overriding the wrapper directory
pub const WRAPPER_DIR_ENV: &str = "OPTIWRAPPER_HOME";

/// Directory layout under `~/Games/wrapper`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperPaths {
    root: PathBuf,
}

impl WrapperPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_env() -> Self {
        if let Some(root) = std::env::var_os(WRAPPER_DIR_ENV) {
            return Self::new(root);
        }
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join("Games").join("wrapper"))
    }

    pub fn settings_file(&self, game: &str) -> PathBuf {
        self.root.join("settings").join(format!("{game}.toml"))
    }

    pub fn time_log(&self, game: &str) -> PathBuf {
        self.root.join("time").join(format!("{game}.log"))
    }

    pub fn debug_log(&self, game: &str) -> PathBuf {
        self.root.join("logs").join(format!("{game}.log"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let paths = WrapperPaths::new("/home/user/Games/wrapper");
        assert_eq!(
            paths.settings_file("Celeste"),
            PathBuf::from("/home/user/Games/wrapper/settings/Celeste.toml")
        );
        assert_eq!(
            paths.time_log("Celeste"),
            PathBuf::from("/home/user/Games/wrapper/time/Celeste.log")
        );
        assert_eq!(
            paths.debug_log("Celeste"),
            PathBuf::from("/home/user/Games/wrapper/logs/Celeste.log")
        );
    }
}
