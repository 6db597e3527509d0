//! Single-writer JSONL output sink.
//!
//! Workers push completed records into a bounded channel; a dedicated
//! thread owns the writer and drains the channel until every sender is
//! gone. Nothing else ever touches the output.

use std::io::Write;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread::JoinHandle;

use crate::error::{NixtractError, Result};
use crate::model::DerivationRecord;

/// Records waiting for the writer; workers block once the writer falls
/// this far behind.
const CHANNEL_CAPACITY: usize = 256;

/// Handle to the writer thread.
pub struct OutputSink {
    handle: JoinHandle<Result<usize>>,
}

impl OutputSink {
    /// Spawn the writer thread. The returned sender is shared with the
    /// workers; the sink drains until the last clone is dropped.
    pub fn spawn(
        writer: Box<dyn Write + Send>,
        pretty: bool,
    ) -> (SyncSender<DerivationRecord>, Self) {
        let (tx, rx) = sync_channel(CHANNEL_CAPACITY);
        let handle = std::thread::Builder::new()
            .name("nixtract-sink".to_owned())
            .spawn(move || write_records(writer, rx, pretty))
            .expect("failed to spawn sink thread");
        (tx, Self { handle })
    }

    /// Wait for the writer to drain and flush; returns the record count.
    pub fn finish(self) -> Result<usize> {
        self.handle
            .join()
            .unwrap_or_else(|_| Err(NixtractError::Io(std::io::Error::other(
                "output sink thread panicked",
            ))))
    }
}

fn write_records(
    mut writer: Box<dyn Write + Send>,
    rx: Receiver<DerivationRecord>,
    pretty: bool,
) -> Result<usize> {
    let mut written = 0usize;
    for record in rx {
        let json = if pretty {
            serde_json::to_string_pretty(&record)
        } else {
            serde_json::to_string(&record)
        }
        .map_err(|source| NixtractError::Parse {
            context: record.attribute_path.clone(),
            source,
        })?;

        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NixpkgsMetadata, ParsedName};
    use std::sync::{Arc, Mutex};

    /// Test writer collecting everything into a shared buffer.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn record(attribute_path: &str) -> DerivationRecord {
        DerivationRecord {
            attribute_path: attribute_path.to_string(),
            derivation_path: None,
            output_path: None,
            outputs: Vec::new(),
            name: format!("{attribute_path}-1.0"),
            parsed_name: ParsedName {
                name: attribute_path.to_string(),
                version: "1.0".to_string(),
            },
            nixpkgs_metadata: NixpkgsMetadata::default(),
            src: None,
            build_inputs: Vec::new(),
        }
    }

    #[test]
    fn test_writes_one_record_per_line() {
        let buf = SharedBuf::default();
        let (tx, sink) = OutputSink::spawn(Box::new(buf.clone()), false);

        tx.send(record("a")).unwrap();
        tx.send(record("b")).unwrap();
        drop(tx);

        assert_eq!(sink.finish().unwrap(), 2);

        let bytes = buf.0.lock().unwrap().clone();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let parsed: DerivationRecord = serde_json::from_str(line).unwrap();
            assert!(!parsed.attribute_path.is_empty());
        }
    }

    #[test]
    fn test_pretty_records_remain_valid_json() {
        let buf = SharedBuf::default();
        let (tx, sink) = OutputSink::spawn(Box::new(buf.clone()), true);

        tx.send(record("a")).unwrap();
        drop(tx);
        assert_eq!(sink.finish().unwrap(), 1);

        let bytes = buf.0.lock().unwrap().clone();
        let text = String::from_utf8(bytes).unwrap();
        let parsed: DerivationRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.attribute_path, "a");
    }

    #[test]
    fn test_empty_stream_flushes_zero_records() {
        let buf = SharedBuf::default();
        let (tx, sink) = OutputSink::spawn(Box::new(buf.clone()), false);
        drop(tx);
        assert_eq!(sink.finish().unwrap(), 0);
        assert!(buf.0.lock().unwrap().is_empty());
    }

    /// Writer that fails every write, to exercise the fatal IO path.
    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk full"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_error_is_fatal() {
        let (tx, sink) = OutputSink::spawn(Box::new(FailingWriter), false);
        // The sink may die before or after this send is queued.
        let _ = tx.send(record("a"));
        drop(tx);
        let err = sink.finish().unwrap_err();
        assert_eq!(err.kind(), "io");
    }
}
