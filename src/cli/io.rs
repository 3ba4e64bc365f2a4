//! JSON output for the CLI
//!
//! Every command prints exactly one JSON object on stdout.

use std::io::Write;

use serde_json::Value;

use super::errors::CliResult;

/// Success envelope
pub fn response(data: Value) -> Value {
    serde_json::json!({
        "status": "ok",
        "data": data
    })
}

/// Error envelope
pub fn error_response(code: &str, message: &str) -> Value {
    serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    })
}

fn write_line<W: Write>(out: &mut W, value: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Write the one envelope describing a command's result.
pub fn write_outcome<W: Write>(out: &mut W, result: &CliResult<Value>) -> CliResult<()> {
    match result {
        Ok(data) => write_line(out, &response(data.clone())),
        Err(e) => write_line(out, &error_response(e.code(), &e.to_string())),
    }
}
