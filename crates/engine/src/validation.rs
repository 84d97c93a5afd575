use std::path::{Component, Path};

use crate::StoreError;

/// Validates a declared transfer name.
///
/// The stored file lives at `<storage>/<id>/<name>`, so the name must be a
/// single plain path component.
///
/// Rejects:
/// - Empty names
/// - Path separators (`/` or `\`)
/// - `.` and `..`
/// - NUL bytes
pub fn validate_file_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(StoreError::InvalidName("empty name".into()));
    }

    if name.contains('\0') {
        return Err(StoreError::InvalidName("name contains NUL byte".into()));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(StoreError::InvalidName(format!(
            "path separators not allowed: {name}"
        )));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(StoreError::InvalidName(format!(
            "not a plain file name: {name}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_name() {
        assert!(validate_file_name("").is_err());
    }

    #[test]
    fn rejects_parent_dir() {
        assert!(validate_file_name("..").is_err());
    }

    #[test]
    fn rejects_current_dir() {
        assert!(validate_file_name(".").is_err());
    }

    #[test]
    fn rejects_traversal() {
        assert!(validate_file_name("../../etc/passwd").is_err());
    }

    #[test]
    fn rejects_subdirectory() {
        assert!(validate_file_name("sub/file.txt").is_err());
    }

    #[test]
    fn rejects_backslash() {
        assert!(validate_file_name("sub\\file.txt").is_err());
    }

    #[test]
    fn rejects_absolute() {
        assert!(validate_file_name("/tmp/x").is_err());
    }

    #[test]
    fn rejects_nul() {
        assert!(validate_file_name("a\0b").is_err());
    }

    #[test]
    fn accepts_plain_name() {
        assert!(validate_file_name("report.pdf").is_ok());
    }

    #[test]
    fn accepts_dotfile() {
        assert!(validate_file_name(".bashrc").is_ok());
    }

    #[test]
    fn accepts_spaces_and_unicode() {
        assert!(validate_file_name("año nuevo.txt").is_ok());
    }
}
