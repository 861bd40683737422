use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};
use itertools::Itertools;
use std::fmt::Debug;
use thiserror::Error;

/// Crate-wide error type.
///
/// The transparent variants wrap the underlying library errors; the
/// stage variants (`Selection`, `Archive`, `Location`, `Restore`,
/// `DuplicateBackup`) classify where in the backup or restore cycle a
/// failure happened and drive the executor's fatal-vs-recorded policy:
/// selection and archiving errors abort the cycle, location errors are
/// accumulated per destination, restore errors are fatal to that restore
/// attempt only.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),
    #[error(transparent)]
    Glob(#[from] globset::Error),
    #[error(transparent)]
    LiblzmaStream(#[from] liblzma::stream::Error),
    #[error(transparent)]
    StripPrefix(#[from] std::path::StripPrefixError),
    #[error(transparent)]
    SerdeYml(#[from] serde_yml::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),
    #[error("selection failed:\n{}", indent::indent_all_with("  ", .0.to_string()))]
    Selection(Box<Error>),
    #[error("archiving failed:\n{}", indent::indent_all_with("  ", .0.to_string()))]
    Archive(Box<Error>),
    #[error("storing to location {} failed:\n{}", location, indent::indent_all_with("  ", error.to_string()))]
    Location { location: String, error: Box<Error> },
    #[error("restore failed:\n{}", indent::indent_all_with("  ", .0.to_string()))]
    Restore(Box<Error>),
    #[error("backup {file_name_base} already stored at location {location}")]
    DuplicateBackup {
        location: String,
        file_name_base: String,
    },
    #[error("{}:\n{}", msg, indent::indent_all_with("  ", error.to_string()))]
    WithMsg { msg: String, error: Box<Error> },
    #[error("{:?} {} failed:\n{}", obj_debug, fn_name, indent::indent_all_with("  ", error.to_string()))]
    WithDebugObjAndFnName {
        error: Box<Error>,
        obj_debug: Box<dyn Debug + Send>,
        fn_name: String,
    },
    #[error("{}", itertools::join(.0, "\n\n"))]
    LotsOfError(Vec<Error>),
}

impl<S: Into<String>, O: Debug + Send + 'static> WithDebugObjectAndFnName<S, O> for Error {
    fn with_debug_object_and_fn_name(self, obj: O, fn_name: S) -> Self {
        Error::WithDebugObjAndFnName {
            error: Box::new(self),
            obj_debug: Box::new(obj),
            fn_name: fn_name.into(),
        }
    }
}

impl<S: Into<String>> WithMsg<S> for Error {
    fn with_msg(self, msg: S) -> Self {
        Self::WithMsg {
            msg: msg.into(),
            error: Box::new(self),
        }
    }
}

impl From<Vec<Error>> for Error {
    fn from(errors: Vec<Error>) -> Self {
        if errors.is_empty() {
            panic!("Should not create lots of errors when error is empty")
        }
        Self::LotsOfError(errors.into_iter().flat_map(|e| e.into_iter()).collect_vec())
    }
}

impl Error {
    pub fn into_iter(self) -> Box<dyn Iterator<Item = Error>> {
        match self {
            Error::LotsOfError(v) => Box::new(v.into_iter().flat_map(|e| e.into_iter())),
            e => Box::new(std::iter::once(e)),
        }
    }

    pub fn chain(self, other: Error) -> Error {
        Error::LotsOfError(self.into_iter().chain(other.into_iter()).collect_vec())
    }

    pub fn selection(self) -> Error {
        Error::Selection(Box::new(self))
    }

    pub fn archive(self) -> Error {
        Error::Archive(Box::new(self))
    }

    pub fn restore(self) -> Error {
        Error::Restore(Box::new(self))
    }

    pub fn at_location<S: Into<String>>(self, location: S) -> Error {
        Error::Location {
            location: location.into(),
            error: Box::new(self),
        }
    }

    /// True if this error (or any error it wraps) is a duplicate-backup
    /// rejection. Duplicates are recorded per location, never fatal to the
    /// run, so the executor keeps them unwrapped in the report.
    pub fn is_duplicate_backup(&self) -> bool {
        match self {
            Error::DuplicateBackup { .. } => true,
            Error::WithMsg { error, .. }
            | Error::WithDebugObjAndFnName { error, .. }
            | Error::Location { error, .. } => error.is_duplicate_backup(),
            Error::LotsOfError(v) => v.iter().any(|e| e.is_duplicate_backup()),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = Error::from(io_error);

        match error {
            Error::Io(_) => (),
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_error_with_msg() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = Error::from(io_error);
        let error_with_msg = error.with_msg("Custom message");

        match error_with_msg {
            Error::WithMsg { msg, .. } => assert_eq!(msg, "Custom message"),
            _ => panic!("Expected WithMsg error"),
        }
    }

    #[test]
    fn test_error_with_debug_object_and_fn_name() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = Error::from(io_error);
        let error_with_debug = error.with_debug_object_and_fn_name("test_object", "test_function");

        match error_with_debug {
            Error::WithDebugObjAndFnName { fn_name, .. } => assert_eq!(fn_name, "test_function"),
            _ => panic!("Expected WithDebugObjAndFnName error"),
        }
    }

    #[test]
    fn test_error_from_vec() {
        let errors = vec![
            Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "error1")),
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "error2",
            )),
        ];

        let combined_error = Error::from(errors);
        match combined_error {
            Error::LotsOfError(error_vec) => assert_eq!(error_vec.len(), 2),
            _ => panic!("Expected LotsOfError"),
        }
    }

    #[test]
    #[should_panic(expected = "Should not create lots of errors when error is empty")]
    fn test_error_from_empty_vec_panics() {
        let errors: Vec<Error> = vec![];
        let _error = Error::from(errors);
    }

    #[test]
    fn test_error_chain() {
        let error1 = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "error1"));
        let error2 = Error::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "error2",
        ));

        let chained = error1.chain(error2);
        match chained {
            Error::LotsOfError(errors) => assert_eq!(errors.len(), 2),
            _ => panic!("Expected LotsOfError"),
        }
    }

    #[test]
    fn test_stage_classifiers_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = Error::from(io_error).selection();
        let error_str = error.to_string();
        assert!(error_str.contains("selection failed"));
        assert!(error_str.contains("file not found"));

        let io_error = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let error = Error::from(io_error).at_location("/backups");
        let error_str = error.to_string();
        assert!(error_str.contains("/backups"));
        assert!(error_str.contains("disk full"));
    }

    #[test]
    fn test_is_duplicate_backup_through_wrappers() {
        let dup = Error::DuplicateBackup {
            location: "/backups".into(),
            file_name_base: "backup_20260828_101500_000_1a".into(),
        };
        assert!(dup.is_duplicate_backup());

        let wrapped = Error::DuplicateBackup {
            location: "/backups".into(),
            file_name_base: "b".into(),
        }
        .with_msg("store failed")
        .at_location("/backups");
        assert!(wrapped.is_duplicate_backup());

        let not_dup = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "x"));
        assert!(!not_dup.is_duplicate_backup());
    }

    #[test]
    fn test_error_with_msg_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = Error::from(io_error);
        let error_with_msg = error.with_msg("Operation failed");
        let error_str = error_with_msg.to_string();

        assert!(error_str.contains("Operation failed"));
        assert!(error_str.contains("file not found"));
    }
}
