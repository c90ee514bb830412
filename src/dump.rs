//! Debug sink: stream raw extracted batches to a file or stdout instead of
//! feeding the kernel.

use std::io::{self, Write};

use crate::cli::{DumpArgs, OutputFormat};
use crate::config::Config;
use crate::entropy::extract::extract;
use crate::entropy::intrinsic::HardwareRng;
use crate::entropy::{self, SourceParams};
use crate::error::Error;
use crate::output;

pub fn run(args: &DumpArgs, config: &Config) -> Result<(), Error> {
    let (mut rng, params) = entropy::select_source(&config.cpu_rng)?;
    let mut out = output::open_output(args.output_file.as_deref())?;

    log::info!(
        "dumping {} output, {}B per batch{}",
        rng.source(),
        params.byte_length(),
        args.batches
            .map(|n| format!(", {} batches", n))
            .unwrap_or_default(),
    );

    let written = dump(&mut rng, &params, &args.format, &mut out, args.batches)?;
    log::info!("wrote {} batches", written);
    Ok(())
}

/// Writes batches until `limit` is reached (forever if `None`) or the reader
/// goes away. Returns the number of batches written.
pub fn dump<R, W>(
    rng: &mut R,
    params: &SourceParams,
    format: &OutputFormat,
    out: &mut W,
    limit: Option<u64>,
) -> Result<u64, Error>
where
    R: HardwareRng + ?Sized,
    W: Write + ?Sized,
{
    let mut written = 0u64;
    while limit.map_or(true, |n| written < n) {
        let batch = extract(rng, params)?;
        match batch.consume(|b| output::write_batch(b.as_bytes(), format, &mut *out)) {
            Ok(()) => written += 1,
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return Ok(written),
            Err(e) => return Err(e.into()),
        }
    }

    match out.flush() {
        Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(e.into()),
        _ => Ok(written),
    }
}
