//! Error type, result alias and error-context combinators.
//!
//! The combinators attach context as errors bubble out of the backup and
//! restore pipelines: `with_msg` adds a free-form message, and
//! `with_debug_object_and_fn_name` records which config object was being
//! driven through which operation when the failure happened.

use std::fmt::Debug;
pub mod error;
pub mod result;

pub trait WithDebugObjectAndFnName<S: Into<String>, O: Debug + 'static> {
    fn with_debug_object_and_fn_name(self, obj: O, fn_name: S) -> Self;
}

pub trait WithMsg<S: Into<String>> {
    fn with_msg(self, msg: S) -> Self;
}
