use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve `program` the way a shell would: paths are checked directly, bare
/// names are searched on `PATH`. Returns `None` unless the target is an
/// executable regular file.
pub fn find_executable(program: &str) -> Option<PathBuf> {
    if program.contains('/') {
        let path = PathBuf::from(program);
        return is_executable(&path).then_some(path);
    }

    let search_path = std::env::var_os("PATH")?;
    let found = std::env::split_paths(&search_path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate));

    debug!("{} resolved to {:?}", program, found);
    found
}

pub fn is_executable(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(metadata) => metadata.is_file() && metadata.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_shell_by_path_and_name() {
        assert_eq!(find_executable("/bin/sh"), Some(PathBuf::from("/bin/sh")));
        assert!(find_executable("sh").is_some());
    }

    #[test]
    fn rejects_non_executable_files() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut perms = fs::metadata(file.path()).unwrap().permissions();
        perms.set_mode(0o644);
        fs::set_permissions(file.path(), perms).unwrap();

        assert!(!is_executable(file.path()));
        assert!(find_executable(file.path().to_str().unwrap()).is_none());
        assert!(find_executable("no-such-program-optiwrapper").is_none());
    }
}
