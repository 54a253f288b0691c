use {
    anyhow::Result,
    fs_err::{OpenOptions, create_dir_all},
    std::{
        io::{self, Write},
        path::Path,
    },
    tokio::{
        runtime::{Handle, RuntimeFlavor},
        task::block_in_place,
    },
};

/// Runs blocking `f` without stalling other tasks when possible.
///
/// `block_in_place` panics on a current-thread runtime, so `f` is called directly there.
#[inline]
pub fn maybe_block_in_place<R>(f: impl FnOnce() -> R) -> R {
    let multi_thread = Handle::try_current()
        .is_ok_and(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread);
    if multi_thread {
        block_in_place(f)
    } else {
        f()
    }
}

/// Opens the log destination: the file in append mode, or stdout if no file is configured.
#[inline]
pub fn log_writer(log_file: Option<&Path>) -> Result<Box<dyn Write + Send>> {
    if let Some(log_file) = log_file {
        if let Some(parent) = log_file.parent() {
            create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)?;
        Ok(Box::new(file))
    } else {
        Ok(Box::new(io::stdout()))
    }
}
