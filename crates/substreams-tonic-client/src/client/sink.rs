//! Rendering of streamed responses.
//!
//! The session hands every response to a [`ResponseSink`] exactly once, in
//! the order the service sent them, and waits for `render` to return before
//! pulling the next one. A slow sink therefore slows the stream down instead
//! of piling responses up in memory.

use std::io::{self, Write};
use substreams_tonic_core::{
    Error, Result,
    proto::{BlockScopedData, Response, response::Message},
};

/// Consumer of streamed responses.
pub trait ResponseSink {
    fn render(&mut self, response: &Response) -> Result<()>;
}

impl<S: ResponseSink + ?Sized> ResponseSink for &mut S {
    fn render(&mut self, response: &Response) -> Result<()> {
        (**self).render(response)
    }
}

/// Writes each response as a pretty-printed structure, one per response.
#[derive(Debug)]
pub struct ConsoleSink<W> {
    out: W,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResponseSink for ConsoleSink<W> {
    fn render(&mut self, response: &Response) -> Result<()> {
        let written = match &response.message {
            Some(message) => {
                trace_message(message);
                writeln!(self.out, "{message:#?}")
            }
            None => writeln!(self.out, "{response:#?}"),
        };
        written.and_then(|()| self.out.flush()).map_err(Error::Sink)
    }
}

fn trace_message(message: &Message) {
    match message {
        Message::Data(data) => trace_module_logs(data),
        Message::Progress(progress) => {
            tracing::trace!(modules = progress.modules.len(), "Progress");
        }
        Message::SnapshotData(snapshot) => {
            tracing::trace!(
                module = %snapshot.module_name,
                sent_keys = snapshot.sent_keys,
                total_keys = snapshot.total_keys,
                "Snapshot data"
            );
        }
        Message::SnapshotComplete(complete) => {
            tracing::debug!(cursor = %complete.cursor, "Snapshot complete");
        }
    }
}

fn trace_module_logs(data: &BlockScopedData) {
    let block = data.clock.as_ref().map_or(0, |clock| clock.number);
    for output in &data.outputs {
        for line in &output.logs {
            tracing::debug!(block, module = %output.name, "{line}");
        }
        if output.logs_truncated {
            tracing::debug!(block, module = %output.name, "Module logs truncated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use substreams_tonic_core::{
        prost_types::Any,
        proto::{Clock, InitialSnapshotComplete, ModuleOutput, module_output::Data},
    };

    fn data(block: u64) -> Response {
        Response {
            message: Some(Message::Data(BlockScopedData {
                outputs: vec![ModuleOutput {
                    name: "block_to_tokens".to_string(),
                    data: Some(Data::MapOutput(Any {
                        type_url: "type.googleapis.com/sf.substreams.tokens.v1.Tokens".to_string(),
                        value: vec![0x0a, 0x00],
                    })),
                    logs: vec!["found 2 tokens".to_string()],
                    logs_truncated: false,
                }],
                clock: Some(Clock {
                    id: format!("0x{block:064x}"),
                    number: block,
                    timestamp: None,
                }),
                step: 4,
                cursor: format!("cursor-{block}"),
            })),
        }
    }

    #[test]
    fn renders_one_block_per_response() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.render(&data(100_000)).unwrap();
        sink.render(&data(100_001)).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let first = out.find("number: 100000").unwrap();
        let second = out.find("number: 100001").unwrap();
        assert!(first < second);
        assert!(out.starts_with("Data("));
        assert_eq!(out.matches("Data(").count(), 2);
    }

    #[test]
    fn renders_control_messages_verbatim() {
        let mut sink = ConsoleSink::new(Vec::new());
        let response = Response {
            message: Some(Message::SnapshotComplete(InitialSnapshotComplete {
                cursor: "abc".to_string(),
            })),
        };
        sink.render(&response).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.contains("SnapshotComplete"));
        assert!(out.contains("\"abc\""));
    }

    #[test]
    fn write_failure_is_sink_error() {
        struct Closed;

        impl Write for Closed {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::ErrorKind::BrokenPipe.into())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut sink = ConsoleSink::new(Closed);
        let err = sink.render(&data(1)).unwrap_err();
        assert!(matches!(err, Error::Sink(_)));
    }
}
