use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use zeroize::Zeroizing;

use crate::cli::OutputFormat;

/// Opens the dump destination: a file if given, otherwise stdout.
pub fn open_output(output_file: Option<&Path>) -> io::Result<Box<dyn Write>> {
    match output_file {
        Some(path) => Ok(Box::new(BufWriter::new(File::create(path)?))),
        None => Ok(Box::new(io::stdout().lock())),
    }
}

/// Writes one batch worth of bytes in the specified format. Text formats end
/// each batch with a newline.
pub fn write_batch<W: Write + ?Sized>(bytes: &[u8], format: &OutputFormat, out: &mut W) -> io::Result<()> {
    match format {
        OutputFormat::Raw => {
            out.write_all(bytes)?;
        }
        OutputFormat::Hex => {
            for b in bytes {
                write!(out, "{:02x}", b)?;
            }
            writeln!(out)?;
        }
        OutputFormat::Base64 => {
            let encoded = Zeroizing::new(STANDARD.encode(bytes));
            writeln!(out, "{}", encoded.as_str())?;
        }
    }
    Ok(())
}
