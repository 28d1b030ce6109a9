//! Direct download: a one-shot save trigger bound to a data URI

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::capture::images::decode_data_uri;
use crate::{Error, Result};

/// Receiver of save requests, the equivalent of the browser's save UI
pub trait DownloadSink {
    fn accept(&self, filename: &str, href: &str) -> Result<()>;
}

impl<T: DownloadSink + ?Sized> DownloadSink for std::rc::Rc<T> {
    fn accept(&self, filename: &str, href: &str) -> Result<()> {
        (**self).accept(filename, href)
    }
}

/// Ephemeral save trigger. Firing consumes it, so it runs at most once.
#[derive(Debug)]
pub struct DownloadTrigger {
    filename: String,
    href: String,
}

impl DownloadTrigger {
    pub fn new(filename: impl Into<String>, href: impl Into<String>) -> Self {
        Self { filename: filename.into(), href: href.into() }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn fire(self, sink: &dyn DownloadSink) -> Result<()> {
        log::debug!("firing download trigger for {}", self.filename);
        sink.accept(&self.filename, &self.href)
    }
}

/// Saves downloads into a directory, writing through a temporary file so a
/// failed save leaves nothing behind
#[derive(Debug, Clone)]
pub struct DirectoryDownloads {
    dir: PathBuf,
}

impl DirectoryDownloads {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where `filename` ends up once saved
    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }
}

fn check_filename(filename: &str) -> Result<()> {
    let bad = filename.is_empty()
        || filename.starts_with('.')
        || filename.contains(['/', '\\'])
        || filename.contains("..");
    if bad {
        return Err(Error::DeliveryFailure(format!("refusing to save as '{}'", filename)));
    }
    Ok(())
}

impl DownloadSink for DirectoryDownloads {
    fn accept(&self, filename: &str, href: &str) -> Result<()> {
        check_filename(filename)?;
        let (_, bytes) = decode_data_uri(href).map_err(|e| Error::DeliveryFailure(e.to_string()))?;

        fs::create_dir_all(&self.dir)
            .map_err(|e| Error::DeliveryFailure(format!("cannot create {}: {}", self.dir.display(), e)))?;
        let target = self.path_for(filename);
        let partial = self.dir.join(format!(".{}.part", filename));

        let written = fs::File::create(&partial).and_then(|mut f| {
            f.write_all(&bytes)?;
            f.sync_all()
        });
        if let Err(e) = written.and_then(|_| fs::rename(&partial, &target)) {
            let _ = fs::remove_file(&partial);
            return Err(Error::DeliveryFailure(format!("failed to save {}: {}", target.display(), e)));
        }
        log::info!("saved {} ({} bytes)", target.display(), bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::images::encode_data_uri;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        seen: RefCell<Vec<(String, String)>>,
    }

    impl DownloadSink for Recorder {
        fn accept(&self, filename: &str, href: &str) -> Result<()> {
            self.seen.borrow_mut().push((filename.to_string(), href.to_string()));
            Ok(())
        }
    }

    #[test]
    fn trigger_fires_once_with_its_binding() {
        let rec = Recorder::default();
        let trigger = DownloadTrigger::new("a_classic_1.png", "data:image/png;base64,AAAA");
        assert_eq!(trigger.filename(), "a_classic_1.png");
        trigger.fire(&rec).unwrap();
        assert_eq!(rec.seen.borrow().len(), 1);
        assert_eq!(rec.seen.borrow()[0].1, "data:image/png;base64,AAAA");
    }

    #[test]
    fn directory_sink_writes_decoded_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectoryDownloads::new(dir.path().join("out"));
        sink.accept("x_classic_1.png", &encode_data_uri("image/png", b"pngbytes")).unwrap();
        assert_eq!(fs::read(sink.path_for("x_classic_1.png")).unwrap(), b"pngbytes");
        let leftovers: Vec<_> = fs::read_dir(sink.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn bad_names_and_payloads_are_delivery_failures() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectoryDownloads::new(dir.path());
        let href = encode_data_uri("image/png", b"x");
        assert!(sink.accept("../evil.png", &href).unwrap_err().is_delivery_failure());
        assert!(sink.accept("", &href).unwrap_err().is_delivery_failure());
        assert!(sink.accept("ok.png", "not a data uri").unwrap_err().is_delivery_failure());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn unusable_directory_is_a_delivery_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("taken");
        fs::write(&blocker, b"not a directory").unwrap();
        let sink = DirectoryDownloads::new(blocker.join("out"));
        let err = sink.accept("x_classic_1.png", &encode_data_uri("image/png", b"png")).unwrap_err();
        assert!(err.is_delivery_failure(), "got {:?}", err);
        assert!(err.to_string().contains("cannot create"));
    }
}
