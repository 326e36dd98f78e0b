//! A `log::Log` implementation that writes to a file instead of stdout/stderr. Diagnostic
//! logging only, independent of any persisted chat history. `RIRC_LOG` is the filter env var.
//! All I/O errors are ignored -- once installed this logger never panics.

use env_logger::filter::{self, Filter};
use log::{Log, Record};

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::mem::replace;
use std::path::PathBuf;
use std::sync::Mutex;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub(crate) fn init(path: PathBuf) {
    let filter = filter::Builder::from_env("RIRC_LOG").build();
    let sink = Mutex::new(LazyFile::new(path));

    log::set_max_level(filter.filter());
    log::set_boxed_logger(Box::new(Logger { sink, filter })).unwrap();
}

struct Logger {
    sink: Mutex<LazyFile>,
    filter: Filter,
}

impl Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.filter.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.filter.matches(record) {
            return;
        }

        self.sink.lock().unwrap().with_file(|file| {
            let _ = writeln!(
                file,
                "[{}] {} [{}:{}] {}",
                timestamp(),
                record.level(),
                record.file().unwrap_or_default(),
                record.line().unwrap_or_default(),
                record.args()
            );
        });
    }

    fn flush(&self) {}
}

fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

enum LazyFile {
    NotOpen(PathBuf),
    Open(File),
    Error,
}

impl LazyFile {
    fn new(path: PathBuf) -> Self {
        LazyFile::NotOpen(path)
    }

    fn with_file<F>(&mut self, f: F)
    where
        F: Fn(&mut File),
    {
        let mut file = match replace(self, LazyFile::Error) {
            LazyFile::NotOpen(path) => {
                match OpenOptions::new().create(true).append(true).open(path) {
                    Ok(mut file) => {
                        let _ = writeln!(file, "\n*** Logging started at {}\n", timestamp());
                        file
                    }
                    Err(_) => return,
                }
            }
            LazyFile::Open(file) => file,
            LazyFile::Error => return,
        };

        f(&mut file);
        *self = LazyFile::Open(file);
    }
}
