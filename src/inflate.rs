/*
 * The resumable DEFLATE block decoder and its driving state machine.
 *
 * inflate() advances the decoder until the caller's output span is full
 * (TargetExhausted), the input span is drained with more expected
 * (SourceExhausted), or the final block has been consumed (Finished). The
 * state machine suspends and resumes losslessly at any of those points: the
 * suspended position is encoded as a BlockState plus, inside a Huffman
 * block, a DecodePhase with the partially decoded match in scalar fields.
 * No recursion, no callbacks; each phase is a straight-line step that
 * either falls through or returns with its position saved.
 *
 * Two decode loops share all table and window helpers: a checked loop that
 * tests for exhaustion at every step, and a fast loop that runs while the
 * spans are long enough that no symbol can hit a boundary, refilling the
 * reservoir a word at a time and copying matches a word at a time. Bytes
 * the fast loop over-reads into the reservoir are pushed back to the input
 * cursor on return, so both loops leave identical externally visible
 * state.
 */

use crate::bitstream::{BitReservoir, Source, BITBUF_BYTES};
use crate::deflate_constants::*;
use crate::huffman::entry::{TableEntry, TAG_EOB, TAG_LITERAL, TAG_MAX_EXTRA};
use crate::huffman::{
    build_decode_table, fixed_litlen_lens, fixed_offset_lens, DecodeTables, TableKind,
    LITLEN_TABLEBITS, OFFSET_TABLEBITS, PRECODE_TABLEBITS,
};
use crate::window::{Target, Window};
use crate::InflateError;
use nightly_quirks::branch_pred::{likely, unlikely};

/* How a successful inflate() call stopped. */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InflateStatus {
    /* The final block has been fully decoded; further calls are no-ops. */
    Finished,
    /* The input span was drained; refill and call again. */
    SourceExhausted,
    /* The output span was filled; drain and call again. */
    TargetExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inflated {
    pub status: InflateStatus,
    /* Input bytes consumed; bytes past this must be presented again. */
    pub consumed: usize,
    /* Output bytes produced at the start of the output span. */
    pub written: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    NeedHeader,
    StoredLen,
    StoredNlen,
    StoredBody,
    DynamicCounts,
    DynamicPrecode,
    DynamicCodeLens,
    Decoding,
    FinalConsumed,
    Bad,
}

/* Micro-phase of the literal/length/distance cycle, for suspension inside
 * a Huffman block. */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodePhase {
    LitLenSym,
    LenExtra,
    OffsetSym,
    OffsetExtra,
    Copy,
}

/*
 * Fast-loop guards. While at least this much input and output remains, one
 * whole literal/length/distance cycle (at most 48 bits in, at most 258
 * bytes out) cannot hit a span boundary, so the fast loop omits every
 * suspension check. The input slack covers a wordwise reservoir refill;
 * the output slack covers a match plus word-copy granularity.
 */
const FASTPATH_SRC_SLACK: usize = BITBUF_BYTES + 6;
const FASTPATH_DST_SLACK: usize = DEFLATE_MAX_MATCH_LEN + 2 * BITBUF_BYTES;

/* Reservoir levels that let each step run without an underflow check: a
 * 15-bit codeword plus 5 length extra bits, a 15-bit codeword alone, and
 * 13 distance extra bits. */
const FASTPATH_LITLEN_BITS: u32 = 20;
const FASTPATH_OFFSET_BITS: u32 = 15;
const FASTPATH_EXTRA_BITS: u32 = 13;

#[cfg(target_pointer_width = "64")]
const_assert!(FASTPATH_SRC_SLACK == 14 && FASTPATH_DST_SLACK == 274);
#[cfg(target_pointer_width = "32")]
const_assert!(FASTPATH_SRC_SLACK == 10 && FASTPATH_DST_SLACK == 266);

/* A refill must be able to satisfy the largest step requirement. */
const_assert!(FASTPATH_LITLEN_BITS as usize <= crate::bitstream::MAX_ENSURE as usize);

pub struct Inflater {
    state: BlockState,
    bits: BitReservoir,
    window: Window,
    tables: Option<Box<DecodeTables>>,
    err: Option<InflateError>,

    final_block: bool,
    input_consumed: bool,

    /* STORED block progress. */
    stored_remaining: u32,

    /* Dynamic header progress. */
    num_litlen_syms: usize,
    num_offset_syms: usize,
    num_explicit_precode_lens: usize,
    precode_lens_read: usize,
    lens_read: usize,

    /* Partially decoded match. */
    phase: DecodePhase,
    match_len: u32,
    match_dist: u32,
    extra_bits: u8,
}

impl Inflater {
    /* Creation allocates nothing; the first reset() claims the window and
     * table storage, which is then retained across resets. */
    pub fn new() -> Self {
        Self {
            state: BlockState::NeedHeader,
            bits: BitReservoir::new(),
            window: Window::new(),
            tables: None,
            err: None,
            final_block: false,
            input_consumed: false,
            stored_remaining: 0,
            num_litlen_syms: 0,
            num_offset_syms: 0,
            num_explicit_precode_lens: 0,
            precode_lens_read: 0,
            lens_read: 0,
            phase: DecodePhase::LitLenSym,
            match_len: 0,
            match_dist: 0,
            extra_bits: 0,
        }
    }

    pub fn reset(&mut self) -> Result<(), InflateError> {
        if self.tables.is_none() {
            self.tables = Some(DecodeTables::new_boxed());
        }
        self.window.allocate()?;
        self.window.clear();
        self.bits = BitReservoir::new();
        self.state = BlockState::NeedHeader;
        self.err = None;
        self.final_block = false;
        self.input_consumed = false;
        self.stored_remaining = 0;
        self.num_litlen_syms = 0;
        self.num_offset_syms = 0;
        self.num_explicit_precode_lens = 0;
        self.precode_lens_read = 0;
        self.lens_read = 0;
        self.phase = DecodePhase::LitLenSym;
        self.match_len = 0;
        self.match_dist = 0;
        self.extra_bits = 0;
        Ok(())
    }

    /* Install the tail of a preset dictionary as back-reference history.
     * Valid only after reset and before any input byte is consumed. */
    pub fn set_dictionary(&mut self, dictionary: &[u8]) -> Result<(), InflateError> {
        if !self.window.is_allocated()
            || self.input_consumed
            || self.state != BlockState::NeedHeader
        {
            return Err(self.fail(InflateError::BadState));
        }
        self.window.feed(dictionary);
        Ok(())
    }

    /*
     * Decode from 'input' into 'output' until one of them runs out or the
     * stream ends. 'final_input' promises that no bytes follow the input
     * span; needing more input then becomes an InputEnd error.
     *
     * On return the window reflects every byte written, the unconsumed
     * input tail must be presented again on the next call, and the output
     * span is free to reuse. Errors are terminal until reset.
     */
    pub fn inflate(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        final_input: bool,
    ) -> Result<Inflated, InflateError> {
        if let Some(err) = self.err {
            return Err(err);
        }
        let mut tables = self.tables.take().ok_or(InflateError::BadState)?;

        let mut src = Source::new(input);
        let mut dst = Target::new(output);
        let result = self.run(&mut tables, &mut src, &mut dst, final_input);
        self.tables = Some(tables);

        /* Suspension contract: land the cursor on a byte boundary with
         * fewer than 8 bits buffered, then publish the new history. */
        self.bits.rewind_to_byte_boundary(&mut src);
        self.window.feed(dst.filled());
        if src.position() > 0 {
            self.input_consumed = true;
        }

        let status = result?;
        Ok(Inflated {
            status,
            consumed: src.position(),
            written: dst.written(),
        })
    }

    fn fail(&mut self, error: InflateError) -> InflateError {
        self.err = Some(error);
        self.state = BlockState::Bad;
        error
    }

    fn source_ended(&mut self, final_input: bool) -> Result<InflateStatus, InflateError> {
        if final_input {
            Err(self.fail(InflateError::InputEnd))
        } else {
            Ok(InflateStatus::SourceExhausted)
        }
    }

    /* Leave a finished block: realign at the end of the stream, otherwise
     * go look for the next header. */
    fn finish_block(&mut self, src: &mut Source) {
        self.phase = DecodePhase::LitLenSym;
        if self.final_block {
            self.bits.rewind_to_byte_boundary(src);
            self.bits.align_to_byte();
            self.state = BlockState::FinalConsumed;
        } else {
            self.state = BlockState::NeedHeader;
        }
    }

    fn run(
        &mut self,
        tables: &mut DecodeTables,
        src: &mut Source,
        dst: &mut Target,
        final_input: bool,
    ) -> Result<InflateStatus, InflateError> {
        loop {
            match self.state {
                BlockState::NeedHeader => {
                    if !self.bits.try_ensure(src, 3) {
                        return self.source_ended(final_input);
                    }
                    self.final_block = self.bits.pop_bits(1) != 0;
                    match self.bits.pop_bits(2) {
                        DEFLATE_BLOCKTYPE_UNCOMPRESSED => {
                            self.bits.align_to_byte();
                            self.state = BlockState::StoredLen;
                        }
                        DEFLATE_BLOCKTYPE_STATIC_HUFFMAN => {
                            self.load_static_tables(tables)?;
                            self.state = BlockState::Decoding;
                        }
                        DEFLATE_BLOCKTYPE_DYNAMIC_HUFFMAN => {
                            self.state = BlockState::DynamicCounts;
                        }
                        _ => return Err(self.fail(InflateError::BadBlock)),
                    }
                }

                BlockState::StoredLen => {
                    if !self.bits.try_ensure(src, 16) {
                        return self.source_ended(final_input);
                    }
                    self.stored_remaining = self.bits.pop_bits(16);
                    self.state = BlockState::StoredNlen;
                }

                BlockState::StoredNlen => {
                    if !self.bits.try_ensure(src, 16) {
                        return self.source_ended(final_input);
                    }
                    let nlen = self.bits.pop_bits(16);
                    if self.stored_remaining != !nlen & 0xffff {
                        return Err(self.fail(InflateError::BadBlock));
                    }
                    self.state = BlockState::StoredBody;
                }

                BlockState::StoredBody => {
                    /* The reservoir may still hold whole bytes pulled for
                     * the header; drain those before bulk-copying. */
                    while self.stored_remaining > 0 && self.bits.count() >= 8 {
                        if dst.is_full() {
                            return Ok(InflateStatus::TargetExhausted);
                        }
                        dst.push_byte(self.bits.pop_bits(8) as u8);
                        self.stored_remaining -= 1;
                    }
                    while self.stored_remaining > 0 {
                        if dst.is_full() {
                            return Ok(InflateStatus::TargetExhausted);
                        }
                        let count = (self.stored_remaining as usize)
                            .min(src.remaining())
                            .min(dst.remaining());
                        if count == 0 {
                            return self.source_ended(final_input);
                        }
                        dst.extend_from_slice(&src.bytes()[..count]);
                        src.advance(count);
                        self.stored_remaining -= count as u32;
                    }
                    self.finish_block(src);
                }

                BlockState::DynamicCounts => {
                    if !self.bits.try_ensure(src, 5 + 5 + 4) {
                        return self.source_ended(final_input);
                    }
                    self.num_litlen_syms = self.bits.pop_bits(5) as usize + 257;
                    self.num_offset_syms = self.bits.pop_bits(5) as usize + 1;
                    self.num_explicit_precode_lens = self.bits.pop_bits(4) as usize + 4;
                    if self.num_litlen_syms > DEFLATE_MAX_LITLEN_CODES
                        || self.num_offset_syms > DEFLATE_MAX_OFFSET_CODES
                    {
                        return Err(self.fail(InflateError::BadTree));
                    }
                    tables.precode_lens.fill(0);
                    self.precode_lens_read = 0;
                    self.state = BlockState::DynamicPrecode;
                }

                BlockState::DynamicPrecode => {
                    while self.precode_lens_read < self.num_explicit_precode_lens {
                        if !self.bits.try_ensure(src, 3) {
                            return self.source_ended(final_input);
                        }
                        let slot =
                            DEFLATE_PRECODE_LENS_PERMUTATION[self.precode_lens_read] as usize;
                        tables.precode_lens[slot] = self.bits.pop_bits(3) as u8;
                        self.precode_lens_read += 1;
                    }
                    build_decode_table(&mut tables.precode, &tables.precode_lens, TableKind::Precode)
                        .map_err(|e| self.fail(e))?;
                    self.lens_read = 0;
                    self.state = BlockState::DynamicCodeLens;
                }

                BlockState::DynamicCodeLens => {
                    let total = self.num_litlen_syms + self.num_offset_syms;
                    while self.lens_read < total {
                        /* Take the precode symbol and, for the repeat
                         * forms, its extra bits in one step, so that a
                         * suspension never splits a symbol. */
                        let entry = loop {
                            let entry = tables.precode
                                [self.bits.bits(PRECODE_TABLEBITS as u32) as usize];
                            let extra: u32 = match entry.info {
                                16 => 2,
                                17 => 3,
                                18 => 7,
                                _ => 0,
                            };
                            if u32::from(entry.length) + extra <= self.bits.count() {
                                break entry;
                            }
                            if !self.bits.fetch_byte(src) {
                                return self.source_ended(final_input);
                            }
                        };
                        self.bits.remove_bits(entry.length as u32);

                        let presym = entry.info;
                        if presym < 16 {
                            tables.lens[self.lens_read] = presym as u8;
                            self.lens_read += 1;
                            continue;
                        }
                        let (repeat, value) = match presym {
                            16 => {
                                if self.lens_read == 0 {
                                    return Err(self.fail(InflateError::BadTree));
                                }
                                (
                                    3 + self.bits.pop_bits(2) as usize,
                                    tables.lens[self.lens_read - 1],
                                )
                            }
                            17 => (3 + self.bits.pop_bits(3) as usize, 0),
                            _ => (11 + self.bits.pop_bits(7) as usize, 0),
                        };
                        if self.lens_read + repeat > total {
                            return Err(self.fail(InflateError::BadTree));
                        }
                        tables.lens[self.lens_read..self.lens_read + repeat].fill(value);
                        self.lens_read += repeat;
                    }

                    if tables.lens[DEFLATE_END_OF_BLOCK_SYM] == 0 {
                        return Err(self.fail(InflateError::BadTree));
                    }
                    tables.static_codes_loaded = false;

                    let num_litlen = self.num_litlen_syms;
                    let num_offset = self.num_offset_syms;
                    build_decode_table(
                        &mut tables.offset,
                        &tables.lens[num_litlen..num_litlen + num_offset],
                        TableKind::Offset,
                    )
                    .map_err(|e| self.fail(e))?;
                    build_decode_table(
                        &mut tables.litlen,
                        &tables.lens[..num_litlen],
                        TableKind::LitLen,
                    )
                    .map_err(|e| self.fail(e))?;

                    self.phase = DecodePhase::LitLenSym;
                    self.state = BlockState::Decoding;
                }

                BlockState::Decoding => {
                    if let Some(status) = self.decode_huffman_block(tables, src, dst, final_input)? {
                        return Ok(status);
                    }
                    /* Block finished; finish_block already advanced. */
                }

                BlockState::FinalConsumed => return Ok(InflateStatus::Finished),

                BlockState::Bad => {
                    return Err(self.err.unwrap_or(InflateError::BadState));
                }
            }
        }
    }

    fn load_static_tables(&mut self, tables: &mut DecodeTables) -> Result<(), InflateError> {
        if !tables.static_codes_loaded {
            build_decode_table(&mut tables.litlen, &fixed_litlen_lens(), TableKind::LitLen)
                .map_err(|e| self.fail(e))?;
            build_decode_table(&mut tables.offset, &fixed_offset_lens(), TableKind::Offset)
                .map_err(|e| self.fail(e))?;
            tables.static_codes_loaded = true;
        }
        self.phase = DecodePhase::LitLenSym;
        Ok(())
    }

    /* One Huffman-coded block. Ok(None) means the end-of-block symbol was
     * consumed; Ok(Some(..)) is a suspension. */
    fn decode_huffman_block(
        &mut self,
        tables: &mut DecodeTables,
        src: &mut Source,
        dst: &mut Target,
        final_input: bool,
    ) -> Result<Option<InflateStatus>, InflateError> {
        loop {
            match self.phase {
                DecodePhase::LitLenSym => {
                    if src.remaining() >= FASTPATH_SRC_SLACK
                        && dst.remaining() >= FASTPATH_DST_SLACK
                    {
                        if self.decode_fast(tables, src, dst)? {
                            self.finish_block(src);
                            return Ok(None);
                        }
                        /* A span shrank below its guard; take the checked
                         * loop for the remainder. */
                    }
                    if dst.is_full() {
                        return Ok(Some(InflateStatus::TargetExhausted));
                    }
                    let entry = match decode_symbol(
                        &mut self.bits,
                        src,
                        &tables.litlen,
                        LITLEN_TABLEBITS,
                    ) {
                        Some(entry) => entry,
                        None => return self.source_ended(final_input).map(Some),
                    };
                    if likely(entry.tag == TAG_LITERAL) {
                        dst.push_byte(entry.info as u8);
                    } else if entry.tag <= TAG_MAX_EXTRA {
                        self.match_len = u32::from(entry.info);
                        self.extra_bits = entry.tag;
                        self.phase = DecodePhase::LenExtra;
                    } else if entry.tag == TAG_EOB {
                        self.finish_block(src);
                        return Ok(None);
                    } else {
                        return Err(self.fail(InflateError::BadCode));
                    }
                }

                DecodePhase::LenExtra => {
                    let extra = u32::from(self.extra_bits);
                    if !self.bits.try_ensure(src, extra) {
                        return self.source_ended(final_input).map(Some);
                    }
                    self.match_len += self.bits.pop_bits(extra);
                    self.phase = DecodePhase::OffsetSym;
                }

                DecodePhase::OffsetSym => {
                    let entry = match decode_symbol(
                        &mut self.bits,
                        src,
                        &tables.offset,
                        OFFSET_TABLEBITS,
                    ) {
                        Some(entry) => entry,
                        None => return self.source_ended(final_input).map(Some),
                    };
                    if unlikely(entry.tag > TAG_MAX_EXTRA) {
                        return Err(self.fail(InflateError::BadCode));
                    }
                    self.match_dist = u32::from(entry.info);
                    self.extra_bits = entry.tag;
                    self.phase = DecodePhase::OffsetExtra;
                }

                DecodePhase::OffsetExtra => {
                    let extra = u32::from(self.extra_bits);
                    if !self.bits.try_ensure(src, extra) {
                        return self.source_ended(final_input).map(Some);
                    }
                    self.match_dist += self.bits.pop_bits(extra);
                    self.phase = DecodePhase::Copy;
                }

                DecodePhase::Copy => {
                    self.copy_backref(dst)?;
                    if self.match_len > 0 {
                        return Ok(Some(InflateStatus::TargetExhausted));
                    }
                    self.phase = DecodePhase::LitLenSym;
                }
            }
        }
    }

    /*
     * The fast loop: no suspension checks, wordwise refills, wordwise
     * copies. Output must be bit-identical to the checked loop. Returns
     * true when the end-of-block symbol was consumed, false when a guard
     * expired and the checked loop must take over.
     */
    fn decode_fast(
        &mut self,
        tables: &mut DecodeTables,
        src: &mut Source,
        dst: &mut Target,
    ) -> Result<bool, InflateError> {
        while src.remaining() >= FASTPATH_SRC_SLACK && dst.remaining() >= FASTPATH_DST_SLACK {
            if self.bits.count() < FASTPATH_LITLEN_BITS {
                self.bits.refill(src);
            }

            let mut entry = tables.litlen[self.bits.bits(LITLEN_TABLEBITS as u32) as usize];
            if unlikely(entry.is_subtable()) {
                let suffix =
                    (self.bits.bits(entry.length as u32) as usize) >> LITLEN_TABLEBITS;
                entry = tables.litlen[entry.info as usize + suffix];
            }
            self.bits.remove_bits(entry.length as u32);

            if likely(entry.tag == TAG_LITERAL) {
                dst.push_byte(entry.info as u8);
                continue;
            }
            if unlikely(entry.tag > TAG_MAX_EXTRA) {
                if entry.tag == TAG_EOB {
                    return Ok(true);
                }
                return Err(self.fail(InflateError::BadCode));
            }
            let mut length =
                entry.info as usize + self.bits.pop_bits(entry.tag as u32) as usize;

            if self.bits.count() < FASTPATH_OFFSET_BITS {
                self.bits.refill(src);
            }
            let mut offset_entry = tables.offset[self.bits.bits(OFFSET_TABLEBITS as u32) as usize];
            if unlikely(offset_entry.is_subtable()) {
                let suffix =
                    (self.bits.bits(offset_entry.length as u32) as usize) >> OFFSET_TABLEBITS;
                offset_entry = tables.offset[offset_entry.info as usize + suffix];
            }
            self.bits.remove_bits(offset_entry.length as u32);
            if unlikely(offset_entry.tag > TAG_MAX_EXTRA) {
                return Err(self.fail(InflateError::BadCode));
            }

            if self.bits.count() < FASTPATH_EXTRA_BITS {
                self.bits.refill(src);
            }
            let distance =
                offset_entry.info as usize + self.bits.pop_bits(offset_entry.tag as u32) as usize;

            let written = dst.written();
            if unlikely(distance > written) {
                let back = distance - written;
                if back > self.window.count() {
                    return Err(self.fail(InflateError::FarOffset));
                }
                /* The guard leaves room for the whole match, so only the
                 * window boundary can shorten this copy. */
                let copied = self.window.copy_to_target(dst, back, length);
                length -= copied;
                if length > 0 {
                    dst.copy_match_fast(distance, length);
                }
            } else {
                dst.copy_match_fast(distance, length);
            }
        }
        Ok(false)
    }

    /* Checked back-reference copy. Produces as much of the match as the
     * target span allows; the remainder stays in match_len. */
    fn copy_backref(&mut self, dst: &mut Target) -> Result<(), InflateError> {
        let distance = self.match_dist as usize;
        let mut length = self.match_len as usize;
        let written = dst.written();

        if distance > written {
            let back = distance - written;
            if back > self.window.count() {
                return Err(self.fail(InflateError::FarOffset));
            }
            let copied = self.window.copy_to_target(dst, back, length);
            length -= copied;
            if length > 0 && copied == back {
                /* The window part is exhausted; the rest of the source
                 * lies at the start of the target span. */
                length -= dst.copy_match(distance, length);
            }
        } else {
            length -= dst.copy_match(distance, length);
        }
        self.match_len = length as u32;
        Ok(())
    }
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

/*
 * Decode one symbol through a root table and, if needed, its subtable.
 * Accepts an entry only once the reservoir holds its full codeword; the
 * replication of entries over unused high bits makes a zero-extended
 * lookup land on the correct entry whenever its length fits the buffered
 * count. Returns None when more input is needed (nothing consumed).
 */
#[inline(always)]
fn decode_symbol(
    bits: &mut BitReservoir,
    src: &mut Source,
    table: &[TableEntry],
    root_bits: usize,
) -> Option<TableEntry> {
    loop {
        let mut entry = table[bits.bits(root_bits as u32) as usize];
        if unlikely(entry.is_subtable()) {
            let suffix = (bits.bits(entry.length as u32) as usize) >> root_bits;
            entry = table[entry.info as usize + suffix];
        }
        if u32::from(entry.length) <= bits.count() {
            bits.remove_bits(entry.length as u32);
            return Some(entry);
        }
        if !bits.fetch_byte(src) {
            return None;
        }
    }
}
