pub mod compress;
pub mod executor;
pub mod finish;
pub mod location;
pub mod manifest;
pub mod path_matcher;
pub mod result_error;
pub mod selector;
pub mod storage;
pub mod validate;

use std::sync::Arc;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;

/// Provides the file extension contributed by a pipeline stage.
///
/// Archive file names compose the storage extension with the compressor
/// extension (e.g. `tar` + `xz` -> `tar.xz`).
pub trait FileExtProvider {
    fn file_ext(&self) -> Option<Arc<str>>;
}
