//! Upstream record sources.
//!
//! The matcher only needs "give me the next raw record" and "the stream
//! ended or failed"; [`RecordSource`] is that seam.

#[cfg(feature = "http_source")]
mod http;

#[cfg(feature = "http_source")]
pub use http::{
    Authenticator, BasicCredentials, BearerToken, FilterRequest, HttpStreamSource, NoAuth,
    OAuth1Credentials,
};

use std::io::BufRead;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::constants::{BACKGROUND_SOURCE_BUFFER, STOP_POLL_INTERVAL};
use crate::error::{ErrorCategory, Result, TallyError};
use crate::matcher::StopHandle;

pub trait RecordSource {
    /// `Ok(None)` once the stream is exhausted; [`TallyError::Source`] when it
    /// broke. A record that cannot be decoded is a [`TallyError::Parse`] and
    /// the stream carries on after it.
    fn next_record(&mut self) -> Result<Option<String>>;
}

impl<T: RecordSource + ?Sized> RecordSource for Box<T> {
    fn next_record(&mut self) -> Result<Option<String>> {
        (**self).next_record()
    }
}

/// Newline-delimited records from any buffered reader. Blank lines are
/// keep-alives and are skipped. Each line is decoded on its own, so one line
/// of invalid UTF-8 costs that line only.
#[derive(Debug)]
pub struct LineSource<R> {
    reader: R,
    buf: Vec<u8>,
    lines_read: u64,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            lines_read: 0,
        }
    }

    #[must_use]
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }
}

impl<R: BufRead> RecordSource for LineSource<R> {
    fn next_record(&mut self) -> Result<Option<String>> {
        loop {
            self.buf.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut self.buf)
                .map_err(|err| TallyError::Source {
                    reason: format!("read failed after {} lines: {err}", self.lines_read),
                })?;
            if read == 0 {
                return Ok(None);
            }
            self.lines_read += 1;
            let mut line = self.buf.as_slice();
            while let [rest @ .., b'\n' | b'\r'] = line {
                line = rest;
            }
            if line.trim_ascii().is_empty() {
                continue;
            }
            return match std::str::from_utf8(line) {
                Ok(text) => Ok(Some(text.to_string())),
                Err(err) => Err(TallyError::Parse {
                    reason: format!("line {} is not valid UTF-8: {err}", self.lines_read),
                }),
            };
        }
    }
}

impl<I> RecordSource for std::vec::IntoIter<I>
where
    I: Into<String>,
{
    fn next_record(&mut self) -> Result<Option<String>> {
        Ok(self.next().map(Into::into))
    }
}

/// Pulls from another source on a dedicated reader thread.
///
/// A pull waits at most one poll interval at a time and ends the stream with
/// `Ok(None)` once the stop handle is raised, even while the inner source is
/// blocked on a quiet connection. The reader thread itself is detached and
/// exits at its next record boundary after the stop.
#[derive(Debug)]
pub struct BackgroundSource {
    records: Receiver<Result<Option<String>>>,
    stop: StopHandle,
    poll: Duration,
    finished: bool,
}

impl BackgroundSource {
    pub fn spawn<S>(mut source: S, stop: StopHandle) -> Result<Self>
    where
        S: RecordSource + Send + 'static,
    {
        let (sender, records) = crossbeam_channel::bounded(BACKGROUND_SOURCE_BUFFER);
        let reader_stop = stop.clone();
        thread::Builder::new()
            .name("tally-source".to_string())
            .spawn(move || {
                loop {
                    let item = source.next_record();
                    let last = ends_stream(&item);
                    if sender.send(item).is_err() || last || reader_stop.is_stopped() {
                        break;
                    }
                }
                tracing::debug!("source reader exited");
            })?;
        Ok(Self {
            records,
            stop,
            poll: STOP_POLL_INTERVAL,
            finished: false,
        })
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll.max(Duration::from_millis(1));
        self
    }
}

fn ends_stream(item: &Result<Option<String>>) -> bool {
    match item {
        Ok(Some(_)) => false,
        Ok(None) => true,
        Err(err) => err.category() != ErrorCategory::Parse,
    }
}

impl RecordSource for BackgroundSource {
    fn next_record(&mut self) -> Result<Option<String>> {
        if self.finished {
            return Ok(None);
        }
        loop {
            match self.records.recv_timeout(self.poll) {
                Ok(item) => {
                    self.finished = ends_stream(&item);
                    return item;
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.stop.is_stopped() {
                        tracing::debug!("stop raised while the source was quiet");
                        self.finished = true;
                        return Ok(None);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.finished = true;
                    return Err(TallyError::Source {
                        reason: "source reader thread exited unexpectedly".to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Sender;
    use std::io::{BufReader, Cursor, Read};
    use std::time::Instant;

    #[test]
    fn yields_lines_and_skips_keepalives() {
        let mut source = LineSource::new(Cursor::new("{\"text\":\"a\"}\r\n\r\n\n{\"text\":\"b\"}"));
        assert_eq!(source.next_record().unwrap().as_deref(), Some("{\"text\":\"a\"}"));
        assert_eq!(source.next_record().unwrap().as_deref(), Some("{\"text\":\"b\"}"));
        assert_eq!(source.next_record().unwrap(), None);
        assert_eq!(source.lines_read(), 4);
    }

    #[test]
    fn invalid_utf8_costs_one_line() {
        let raw: &[u8] = b"one\n\xff\xfe bad\ntwo\n";
        let mut source = LineSource::new(Cursor::new(raw));
        assert_eq!(source.next_record().unwrap().as_deref(), Some("one"));
        let err = source.next_record().unwrap_err();
        assert!(matches!(err, TallyError::Parse { .. }), "{err:?}");
        assert!(err.to_string().contains("line 2"), "{err}");
        assert_eq!(source.next_record().unwrap().as_deref(), Some("two"));
        assert_eq!(source.next_record().unwrap(), None);
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "peer went away",
            ))
        }
    }

    #[test]
    fn read_errors_are_source_errors() {
        let mut source = LineSource::new(BufReader::new(Broken));
        let err = source.next_record().unwrap_err();
        assert!(matches!(err, TallyError::Source { .. }));
        assert!(err.to_string().contains("peer went away"));
    }

    #[test]
    fn vectors_are_sources() {
        let mut source = vec!["one", "two"].into_iter();
        assert_eq!(source.next_record().unwrap().as_deref(), Some("one"));
        assert_eq!(source.next_record().unwrap().as_deref(), Some("two"));
        assert_eq!(source.next_record().unwrap(), None);
    }

    /// Blocks in `next_record` until the paired sender is dropped.
    struct Quiet(Receiver<()>);

    impl RecordSource for Quiet {
        fn next_record(&mut self) -> Result<Option<String>> {
            let _ = self.0.recv();
            Ok(None)
        }
    }

    fn quiet() -> (Sender<()>, Quiet) {
        let (hold, wait) = crossbeam_channel::bounded(0);
        (hold, Quiet(wait))
    }

    #[test]
    fn background_source_relays_records_in_order() {
        let inner = vec!["a", "b", "c"].into_iter();
        let mut source = BackgroundSource::spawn(inner, StopHandle::new()).unwrap();
        assert_eq!(source.next_record().unwrap().as_deref(), Some("a"));
        assert_eq!(source.next_record().unwrap().as_deref(), Some("b"));
        assert_eq!(source.next_record().unwrap().as_deref(), Some("c"));
        assert_eq!(source.next_record().unwrap(), None);
        assert_eq!(source.next_record().unwrap(), None);
    }

    #[test]
    fn background_source_passes_parse_errors_and_continues() {
        let raw: &[u8] = b"one\n\xff\ntwo\n";
        let inner = LineSource::new(Cursor::new(raw));
        let mut source = BackgroundSource::spawn(inner, StopHandle::new()).unwrap();
        assert_eq!(source.next_record().unwrap().as_deref(), Some("one"));
        assert!(matches!(source.next_record(), Err(TallyError::Parse { .. })));
        assert_eq!(source.next_record().unwrap().as_deref(), Some("two"));
        assert_eq!(source.next_record().unwrap(), None);
    }

    #[test]
    fn background_source_ends_after_a_source_error() {
        let inner = LineSource::new(BufReader::new(Broken));
        let mut source = BackgroundSource::spawn(inner, StopHandle::new()).unwrap();
        assert!(matches!(source.next_record(), Err(TallyError::Source { .. })));
        assert_eq!(source.next_record().unwrap(), None);
    }

    #[test]
    fn stop_ends_a_quiet_stream_within_a_poll() {
        let (hold, inner) = quiet();
        let stop = StopHandle::new();
        let mut source = BackgroundSource::spawn(inner, stop.clone())
            .unwrap()
            .with_poll_interval(Duration::from_millis(10));

        stop.stop();
        let started = Instant::now();
        assert_eq!(source.next_record().unwrap(), None);
        assert!(started.elapsed() < Duration::from_secs(2));
        drop(hold);
    }
}
