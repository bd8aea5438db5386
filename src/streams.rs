/*
 * Buffered byte-stream facade: callback-refilled input and
 * callback-flushed output around the resumable core, so the wrapper
 * parsers can read headers byte-wise and pump the payload span-wise.
 */

pub mod chunked_buffer_input;
pub mod chunked_buffer_output;

use crate::inflate::{InflateStatus, Inflater};
use crate::streams::chunked_buffer_input::ChunkedBufferInput;
use crate::streams::chunked_buffer_output::ChunkedBufferOutput;
use crate::StreamError;

/* Pump one DEFLATE payload through the decoder, refilling and flushing as
 * either side runs dry. The caller has already reset the decoder and
 * parsed any wrapper header. */
pub(crate) fn run_inflate(
    inflater: &mut Inflater,
    input: &mut ChunkedBufferInput,
    output: &mut ChunkedBufferOutput,
) -> Result<(), StreamError> {
    loop {
        if input.remaining().is_empty() {
            input.refill();
        }
        let final_input = input.at_eof();
        let res = inflater.inflate(input.remaining(), output.space(), final_input)?;
        input.consume(res.consumed);
        output.advance(res.written);
        match res.status {
            InflateStatus::Finished => return Ok(()),
            InflateStatus::SourceExhausted => {
                input.refill();
            }
            InflateStatus::TargetExhausted => output.flush()?,
        }
    }
}
