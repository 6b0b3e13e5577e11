// src/pipeline/dispatch.rs
use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};

use once_cell::sync::OnceCell;

use crate::error::ProcessorError;
use crate::pipeline::context::Record;
use crate::registry::ProcessorHandle;

thread_local! {
    static IN_PROCESSOR: Cell<bool> = const { Cell::new(false) };
}

static PANIC_HOOK: OnceCell<()> = OnceCell::new();

/// Send panics raised inside a processor to the debug log instead of stderr.
/// Any other panic still goes to the hook that was installed before.
fn install_panic_hook() {
    PANIC_HOOK.get_or_init(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if IN_PROCESSOR.with(Cell::get) {
                let location = info
                    .location()
                    .map(|l| l.to_string())
                    .unwrap_or_default();
                tracing::debug!(
                    location = %location,
                    message = %panic_message(info.payload()),
                    "processor panicked"
                );
            } else {
                previous(info);
            }
        }));
    });
}

/// A processor invocation that failed and was skipped
#[derive(Debug)]
pub struct DispatchFailure {
    pub processor: String,
    pub error: ProcessorError,
}

/// Outcome of dispatching one record
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub succeeded: usize,
    pub failures: Vec<DispatchFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs every processor, in order, on each record.
///
/// A failing processor (error or panic) is logged and skipped; it never stops
/// the processors after it, nor later records.
pub struct DispatchPipeline {
    processors: Vec<ProcessorHandle>,
    debug: bool,
    failures: u64,
}

impl DispatchPipeline {
    pub fn new(processors: Vec<ProcessorHandle>) -> Self {
        install_panic_hook();
        DispatchPipeline {
            processors,
            debug: false,
            failures: 0,
        }
    }

    /// Log failures with their full source chain
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn processor_names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Total failed invocations since construction
    pub fn failure_count(&self) -> u64 {
        self.failures
    }

    pub fn dispatch(&mut self, record: &Record) -> DispatchReport {
        let mut report = DispatchReport::default();

        for processor in &mut self.processors {
            IN_PROCESSOR.with(|flag| flag.set(true));
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| processor.process(record)));
            IN_PROCESSOR.with(|flag| flag.set(false));
            let outcome = outcome.unwrap_or_else(|payload| {
                Err(ProcessorError::Panicked(panic_message(payload.as_ref())))
            });

            match outcome {
                Ok(()) => report.succeeded += 1,
                Err(error) => {
                    let name = processor.name().to_string();
                    if self.debug {
                        tracing::debug!(processor = %name, error = ?error, record = %record.to_json(), "processor failed");
                    } else {
                        tracing::debug!(processor = %name, error = %error, "processor failed");
                    }
                    self.failures += 1;
                    report.failures.push(DispatchFailure {
                        processor: name,
                        error,
                    });
                }
            }
        }

        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
