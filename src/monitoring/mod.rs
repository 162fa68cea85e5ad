/*!
 * Monitoring
 * Tracing setup and allocator operation spans
 */

mod tracer;

pub use tracer::{init_tracing, span_allocator, AllocatorSpan};
