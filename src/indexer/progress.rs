//! Progress events for `indexRepo`, forwarded over a `crossbeam_channel` so
//! a host (the out-of-scope MCP layer) can surface them without the indexer
//! depending on that layer — spec §4.4 "Progress".

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scanning,
    Parsing,
    Pass1,
    Pass2,
    Finalizing,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Scanning => "scanning",
            Stage::Parsing => "parsing",
            Stage::Pass1 => "pass1",
            Stage::Pass2 => "pass2",
            Stage::Finalizing => "finalizing",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub current: usize,
    pub total: usize,
    pub current_file: Option<String>,
}

/// Cooperative cancellation: an `onProgress` callback returning `false` aborts
/// the run at the next checkpoint, per spec §5 "progress callbacks can abort".
pub type ProgressCallback<'a> = dyn Fn(ProgressEvent) -> bool + Send + Sync + 'a;

pub struct ProgressReporter<'a> {
    callback: Option<&'a ProgressCallback<'a>>,
    sender: Option<crossbeam_channel::Sender<ProgressEvent>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(callback: Option<&'a ProgressCallback<'a>>, sender: Option<crossbeam_channel::Sender<ProgressEvent>>) -> Self {
        Self { callback, sender }
    }

    pub fn none() -> Self {
        Self {
            callback: None,
            sender: None,
        }
    }

    /// Emits an event; returns `false` if the callback requested cancellation.
    pub fn emit(&self, stage: Stage, current: usize, total: usize, current_file: Option<String>) -> bool {
        let event = ProgressEvent {
            stage,
            current,
            total,
            current_file,
        };
        if let Some(sender) = &self.sender {
            let _ = sender.send(event.clone());
        }
        match self.callback {
            Some(cb) => cb(event),
            None => true,
        }
    }
}
