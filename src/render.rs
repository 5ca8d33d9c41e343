//! Plain-text error report used by the default callback.
//!
//! The report shows the message, type, location and backtrace of the
//! captured error. It is meant for development; production setups should
//! install their own callback.

use std::backtrace::BacktraceStatus;
use std::fmt::Write as _;
use std::io::{self, Write};

use crate::{CapturedError, CapturedSource, ErrorInterceptor};

/// Renders the report for `error`.
///
/// ```rust
/// use intercept_errors::{core_errors, render::render_report, CapturedError};
///
/// let report = render_report(&CapturedError::core(core_errors::FATAL, "boom", "main.rs", 10));
/// assert!(report.contains("FATAL: \"boom\" in file main.rs[10]"));
/// ```
pub fn render_report(error: &CapturedError) -> String {
    let mut out = String::with_capacity(256);
    // Writing into a String cannot fail.
    let _ = write_report_fmt(&mut out, error);
    out
}

/// Writes the report for `error` to `out`.
pub fn write_report(out: &mut impl Write, error: &CapturedError) -> io::Result<()> {
    out.write_all(render_report(error).as_bytes())?;
    out.flush()
}

fn write_report_fmt(out: &mut String, error: &CapturedError) -> std::fmt::Result {
    writeln!(out, "An error has occurred.")?;
    writeln!(out)?;
    writeln!(out, "{}", error)?;
    writeln!(out, "Severity: {}", error.severity())?;

    if let CapturedSource::Exception {
        lineage, backtrace, ..
    } = error.source()
    {
        writeln!(out, "Type: {}", lineage.join(" < "))?;
        writeln!(out)?;
        writeln!(out, "Backtrace:")?;
        match backtrace.status() {
            BacktraceStatus::Captured => writeln!(out, "{}", backtrace)?,
            _ => writeln!(out, "  (not captured; set RUST_BACKTRACE=1)")?,
        }
    }
    Ok(())
}

/// Default callback body: writes the report for the captured error to stderr.
pub fn report_to_stderr(interceptor: &ErrorInterceptor) {
    let Some(error) = interceptor.last_error() else {
        return;
    };
    let stderr = io::stderr();
    let _ = write_report(&mut stderr.lock(), &error);
}
