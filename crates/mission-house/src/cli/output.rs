//! Output helpers shared by the subcommands.
//!
//! Results go to stdout as JSON; logs go to stderr.

use serde::Serialize;

const JSON_ENV: &str = "MISSION_HOUSE_JSON";

/// Whether `--json` was passed (compact single-line output).
pub fn is_json() -> bool {
    std::env::var(JSON_ENV).is_ok()
}

/// Record the `--json` flag for the rest of the process.
pub fn set_json() {
    std::env::set_var(JSON_ENV, "1");
}

/// Print `value`: compact with `--json`, pretty otherwise.
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    let rendered = if is_json() {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    match rendered {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("  Error: could not serialize output: {e}"),
    }
}
