//! Status message formatting for emitted build steps.

use camino::Utf8Path;

use crate::invocation::Invocation;

/// Renders human-readable status messages for build steps.
///
/// Messages may span multiple lines; consumers that can only show one line
/// keep the first.
pub trait Formatter {
    fn create_auxiliary_directory(&self, directory: &Utf8Path) -> String;
    fn begin_invocation(&self, invocation: &Invocation, executable: &str) -> String;
}

/// Xcode-style formatter: a status verb line followed by the indented
/// working-directory change.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultFormatter;

impl Formatter for DefaultFormatter {
    fn create_auxiliary_directory(&self, directory: &Utf8Path) -> String {
        format!("CreateBuildDirectory {directory}")
    }

    fn begin_invocation(&self, invocation: &Invocation, executable: &str) -> String {
        let heading = if invocation.description.is_empty() {
            executable
        } else {
            &invocation.description
        };
        format!("{heading}\n    cd {}", invocation.working_directory)
    }
}
