use std::io::{self, Write};

use serde::Serialize;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_result<T: Serialize>(value: &T) -> io::Result<()> {
        Self::write_json(&mut io::stdout(), value)
    }

    pub fn write_json<T: Serialize>(writer: &mut impl Write, value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}
