use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use zeroize::Zeroizing;

use crate::batch::EntropyBatch;

/// ioctl number for RNDGETENTCNT: _IOR('R', 0x00, int)
const RNDGETENTCNT: libc::c_ulong = 0x80045200;

/// ioctl number for RNDADDENTROPY: _IOW('R', 0x03, int[2])
const RNDADDENTROPY: libc::c_ulong = 0x40085203;

/// Something that accepts entropy batches with an entropy credit.
pub trait EntropySink {
    fn add_entropy(&mut self, batch: &EntropyBatch) -> io::Result<()>;
}

/// The blocking pool: a sink that also reports its fill level and can be
/// waited on until it wants more.
pub trait BlockingPool: EntropySink {
    fn entropy_count(&mut self) -> io::Result<u32>;

    fn wait_for_demand(&mut self, timeout: Duration) -> io::Result<Readiness>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The pool signalled that it is ready to accept more entropy.
    Ready,
    TimedOut,
}

/// Build the `rand_pool_info` struct as a raw byte buffer:
/// ```text
/// struct rand_pool_info {
///     int entropy_count;  // number of bits of entropy to credit
///     int buf_size;       // number of bytes in buf
///     __u32 buf[];        // entropy data (must be u32-aligned)
/// };
/// ```
/// The buffer holds a copy of the payload and is scrubbed when dropped.
fn build_rand_pool_info(data: &[u8], entropy_bits: u32) -> Zeroizing<Vec<u8>> {
    let buf_size = data.len() as i32;
    // Pad data to 4-byte alignment
    let padded_len = (data.len() + 3) & !3;
    let total = 4 + 4 + padded_len;
    let mut buf = Zeroizing::new(vec![0u8; total]);
    buf[0..4].copy_from_slice(&(entropy_bits as i32).to_ne_bytes());
    buf[4..8].copy_from_slice(&buf_size.to_ne_bytes());
    buf[8..8 + data.len()].copy_from_slice(data);
    buf
}

fn open_device(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| {
            io::Error::new(
                e.kind(),
                format!(
                    "cannot open {} for read/write: {} (are you root?)",
                    path.display(),
                    e
                ),
            )
        })
}

/// A kernel random device (`/dev/random` or `/dev/urandom`).
///
/// The device is opened eagerly, and reopened on next use if that failed.
#[derive(Debug)]
pub struct KernelPool {
    path: PathBuf,
    file: Option<File>,
}

impl KernelPool {
    pub fn open(path: &Path) -> Self {
        let mut pool = Self {
            path: path.to_path_buf(),
            file: None,
        };
        if let Err(e) = pool.device() {
            log::error!(target: "rdfeed::daemon", "{}", e);
        }
        pool
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn device(&mut self) -> io::Result<&File> {
        let file = match self.file.take() {
            Some(f) => f,
            None => open_device(&self.path)?,
        };
        Ok(&*self.file.insert(file))
    }
}

impl EntropySink for KernelPool {
    /// Inject entropy into the kernel pool via ioctl(RNDADDENTROPY).
    fn add_entropy(&mut self, batch: &EntropyBatch) -> io::Result<()> {
        let fd = self.device()?.as_raw_fd();
        let info = build_rand_pool_info(batch.as_bytes(), batch.declared_entropy_bits());
        let ret = unsafe { libc::ioctl(fd, RNDADDENTROPY, info.as_ptr()) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl BlockingPool for KernelPool {
    fn entropy_count(&mut self) -> io::Result<u32> {
        let fd = self.device()?.as_raw_fd();
        let mut count: libc::c_int = 0;
        let ret = unsafe { libc::ioctl(fd, RNDGETENTCNT, &mut count as *mut libc::c_int) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(count.max(0) as u32)
    }

    fn wait_for_demand(&mut self, timeout: Duration) -> io::Result<Readiness> {
        let fd = match self.device() {
            Ok(f) => f.as_raw_fd(),
            Err(e) => {
                // Nothing to poll; still honour the ceiling so the loop paces itself.
                thread::sleep(timeout);
                return Err(e);
            }
        };

        let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLOUT,
            revents: 0,
        };
        let ret = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        match ret {
            r if r < 0 => Err(io::Error::last_os_error()),
            0 => Ok(Readiness::TimedOut),
            _ => Ok(Readiness::Ready),
        }
    }
}
