/*!
 * Monitoring Module
 * Structured tracing and diagnostic log sinks
 */

pub mod sink;
pub mod tracer;

pub use sink::{LogLevel, LogOrigin, LogRecord, LogSink, RecordingSink, SharedSink, TracingSink};
pub use tracer::{generate_trace_id, init_tracing, span_operation, OperationSpan};
