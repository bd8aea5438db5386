/*
 * Canonical Huffman decode tables.
 *
 * A decode table is a flat array: a root table of 1 << TABLEBITS entries
 * followed by subtables for codewords longer than TABLEBITS bits. The table
 * is indexed with bit-reversed codewords so that the low-order reservoir
 * bits form the index directly; see build_decode_table.
 */

pub mod entry;

use crate::deflate_constants::*;
use crate::huffman::entry::TableEntry;
use crate::InflateError;

/*
 * Root table widths. Each ENOUGH number is the worst-case total entry count
 * (root table plus all subtables) for the corresponding alphabet and
 * maximum codeword length, computed offline with zlib's 'enough' utility.
 * You cannot change a TABLEBITS number without also changing ENOUGH.
 */
pub const PRECODE_TABLEBITS: usize = 7;
pub const LITLEN_TABLEBITS: usize = 9;
pub const OFFSET_TABLEBITS: usize = 7;

pub const PRECODE_ENOUGH: usize = 128; /* enough 19 7 7 */
pub const LITLEN_ENOUGH: usize = 854; /* enough 288 9 15 */
pub const OFFSET_ENOUGH: usize = 402; /* enough 32 7 15 */

const_assert!(PRECODE_TABLEBITS == 7 && PRECODE_ENOUGH == 128);
const_assert!(LITLEN_TABLEBITS == 9 && LITLEN_ENOUGH == 854);
const_assert!(OFFSET_TABLEBITS == 7 && OFFSET_ENOUGH == 402);

/* The precode fits entirely in its root table. */
const_assert!(PRECODE_TABLEBITS == DEFLATE_MAX_PRE_CODEWORD_LEN);

/* Everything the decoder rebuilds per block, allocated once on first reset
 * and reused for the lifetime of the Inflater. */
pub(crate) struct DecodeTables {
    pub litlen: [TableEntry; LITLEN_ENOUGH],
    pub offset: [TableEntry; OFFSET_ENOUGH],
    pub precode: [TableEntry; PRECODE_ENOUGH],
    pub lens: [u8; DEFLATE_NUM_LITLEN_SYMS + DEFLATE_NUM_OFFSET_SYMS],
    pub precode_lens: [u8; DEFLATE_NUM_PRECODE_SYMS],
    pub static_codes_loaded: bool,
}

impl DecodeTables {
    pub fn new_boxed() -> Box<DecodeTables> {
        Box::new(DecodeTables {
            litlen: [TableEntry::INVALID; LITLEN_ENOUGH],
            offset: [TableEntry::INVALID; OFFSET_ENOUGH],
            precode: [TableEntry::INVALID; PRECODE_ENOUGH],
            lens: [0; DEFLATE_NUM_LITLEN_SYMS + DEFLATE_NUM_OFFSET_SYMS],
            precode_lens: [0; DEFLATE_NUM_PRECODE_SYMS],
            static_codes_loaded: false,
        })
    }
}

/* Which code a table decodes; selects root width and decode results. */
#[derive(Copy, Clone, PartialEq, Eq)]
pub(crate) enum TableKind {
    Precode,
    LitLen,
    Offset,
}

impl TableKind {
    #[inline]
    pub(crate) fn root_bits(self) -> usize {
        match self {
            TableKind::Precode => PRECODE_TABLEBITS,
            TableKind::LitLen => LITLEN_TABLEBITS,
            TableKind::Offset => OFFSET_TABLEBITS,
        }
    }

    fn decode_results(self) -> &'static [TableEntry] {
        match self {
            TableKind::Precode => &PRECODE_DECODE_RESULTS,
            TableKind::LitLen => &LITLEN_DECODE_RESULTS,
            TableKind::Offset => &OFFSET_DECODE_RESULTS,
        }
    }
}

/*
 * The decode result for each symbol of each alphabet: the static part of
 * the table entry, before the codeword length is stamped on. Literals carry
 * their byte value, length and offset codes carry the base value and
 * extra-bit count from RFC 1951, and the symbols that exist only to round
 * out the fixed code (286/287 litlen, 30/31 offset) stay invalid.
 */

const fn precode_decode_results() -> [TableEntry; DEFLATE_NUM_PRECODE_SYMS] {
    let mut results = [TableEntry::INVALID; DEFLATE_NUM_PRECODE_SYMS];
    let mut sym = 0;
    while sym < DEFLATE_NUM_PRECODE_SYMS {
        results[sym] = TableEntry::presym(sym as u8);
        sym += 1;
    }
    results
}

const fn litlen_decode_results() -> [TableEntry; DEFLATE_NUM_LITLEN_SYMS] {
    let mut results = [TableEntry::INVALID; DEFLATE_NUM_LITLEN_SYMS];
    let mut sym = 0;
    while sym < 256 {
        results[sym] = TableEntry::literal(sym as u8);
        sym += 1;
    }
    results[DEFLATE_END_OF_BLOCK_SYM] = TableEntry::end_of_block();
    let mut slot = 0;
    while slot < DEFLATE_LENGTH_BASE.len() {
        results[257 + slot] =
            TableEntry::with_base(DEFLATE_LENGTH_BASE[slot], DEFLATE_LENGTH_EXTRA[slot]);
        slot += 1;
    }
    results
}

const fn offset_decode_results() -> [TableEntry; DEFLATE_NUM_OFFSET_SYMS] {
    let mut results = [TableEntry::INVALID; DEFLATE_NUM_OFFSET_SYMS];
    let mut slot = 0;
    while slot < DEFLATE_OFFSET_BASE.len() {
        results[slot] =
            TableEntry::with_base(DEFLATE_OFFSET_BASE[slot], DEFLATE_OFFSET_EXTRA[slot]);
        slot += 1;
    }
    results
}

static PRECODE_DECODE_RESULTS: [TableEntry; DEFLATE_NUM_PRECODE_SYMS] = precode_decode_results();
static LITLEN_DECODE_RESULTS: [TableEntry; DEFLATE_NUM_LITLEN_SYMS] = litlen_decode_results();
static OFFSET_DECODE_RESULTS: [TableEntry; DEFLATE_NUM_OFFSET_SYMS] = offset_decode_results();

/* Code lengths of the fixed (BTYPE=1) codes, RFC 1951 §3.2.6. */
pub(crate) const fn fixed_litlen_lens() -> [u8; DEFLATE_NUM_LITLEN_SYMS] {
    let mut lens = [8u8; DEFLATE_NUM_LITLEN_SYMS];
    let mut sym = 144;
    while sym < 256 {
        lens[sym] = 9;
        sym += 1;
    }
    let mut sym = 256;
    while sym < 280 {
        lens[sym] = 7;
        sym += 1;
    }
    lens
}

pub(crate) const fn fixed_offset_lens() -> [u8; DEFLATE_NUM_OFFSET_SYMS] {
    [5u8; DEFLATE_NUM_OFFSET_SYMS]
}

/*
 * Advance to the lexicographically next codeword of the canonical code.
 * The codeword is kept bit-reversed, so appending zeroes for a length
 * increase is a no-op and incrementing means: find the highest-order zero
 * bit within 'mask', set it, clear everything above it.
 */
const fn advance_codeword(codeword: usize, mask: usize) -> usize {
    const fn bsr32(val: u32) -> u32 {
        (u32::BITS - 1).wrapping_sub(val.leading_zeros())
    }

    let bit = 1usize.wrapping_shl(bsr32((codeword ^ mask) as u32));
    (codeword & bit.wrapping_sub(1)) | bit
}

/*
 * Build the decode table for the canonical Huffman code described by the
 * codeword length of each symbol ('lens[sym]', zero meaning unused).
 *
 * 'table' must be the full capacity slice for 'kind' (the ENOUGH bound);
 * on success every root index maps to a direct entry, a subtable pointer,
 * or an INVALID sentinel.
 *
 * Incomplete codes are rejected, except the two forms RFC 1951 forces the
 * offset code to permit: no codes at all (a literals-only block; the whole
 * table becomes INVALID sentinels) and a single symbol with codeword length
 * one (the unused pattern becomes an INVALID sentinel).
 */
pub(crate) fn build_decode_table(
    table: &mut [TableEntry],
    lens: &[u8],
    kind: TableKind,
) -> Result<(), InflateError> {
    let table_bits = kind.root_bits();
    let decode_results = kind.decode_results();
    let num_syms = lens.len();

    let mut len_counts = [0u16; DEFLATE_MAX_CODEWORD_LEN + 1];
    let mut max_len = 0;
    for &len in lens {
        len_counts[len as usize] += 1;
        max_len = max_len.max(len as usize);
    }

    /* Codespace accounting: a codeword of length k uses 1/2^k of the
     * codespace. 'left' going negative at any step means the code is
     * over-subscribed; 'left' positive at the end means incomplete. */
    let mut left: i32 = 1;
    for k in 1..=DEFLATE_MAX_CODEWORD_LEN {
        left = (left << 1) - i32::from(len_counts[k]);
        if left < 0 {
            return Err(InflateError::BadTree);
        }
    }

    if left > 0 {
        if kind != TableKind::Offset {
            return Err(InflateError::BadTree);
        }
        table.fill(TableEntry::INVALID);

        let used = num_syms - len_counts[0] as usize;
        if used == 0 {
            /* Literals-only block: any consultation of this table means
             * the stream encoded a match it promised not to contain. */
            return Ok(());
        }
        if used == 1 && len_counts[1] == 1 {
            /* One offset symbol, one unused 1-bit pattern. The symbol gets
             * codeword 0; pattern 1 stays an error sentinel. */
            let sym = lens.iter().position(|&len| len != 0).ok_or(InflateError::BadTree)?;
            let entry = decode_results[sym].with_length(1);
            let mut slot = 0;
            while slot < (1 << table_bits) {
                table[slot] = entry;
                slot += 2;
            }
            return Ok(());
        }
        return Err(InflateError::BadTree);
    }

    /* Sort symbols by (codeword length, symbol value) with a counting
     * sort, which is codeword order for a canonical code. */
    let mut offsets = [0u16; DEFLATE_MAX_CODEWORD_LEN + 1];
    offsets[1] = len_counts[0];
    for len in 1..DEFLATE_MAX_CODEWORD_LEN {
        offsets[len + 1] = offsets[len] + len_counts[len];
    }

    let mut sorted_syms = [0u16; DEFLATE_MAX_NUM_SYMS];
    for (sym, &len) in lens.iter().enumerate() {
        sorted_syms[offsets[len as usize] as usize] = sym as u16;
        offsets[len as usize] += 1;
    }
    /* Skip the unused symbols, leaving codeword order. */
    let sorted_syms = &sorted_syms[len_counts[0] as usize..num_syms];

    /*
     * Fill root entries for codewords of length <= table_bits, shortest
     * first. A codeword of length k owns 2^(table_bits - k) entries, but
     * bit-reversal scatters them with stride 2^k; instead of strided
     * stores, treat the table as having 2^k entries while processing
     * length k and double it (copying the first half to the second) each
     * time k increases. Entries copied before their codeword is processed
     * are overwritten once it is, since the code is complete.
     */
    let mut codeword: usize = 0; /* current codeword, bit-reversed */
    let mut sym_index = 0;

    let mut start_len = 1;
    while len_counts[start_len] == 0 {
        start_len += 1;
    }
    let mut cur_table_end = 1 << (start_len - 1);

    for len in start_len..=table_bits.min(max_len) {
        table.copy_within(0..cur_table_end, cur_table_end);
        cur_table_end *= 2;

        for _ in 0..len_counts[len] {
            table[codeword] = decode_results[sorted_syms[sym_index] as usize].with_length(len as u8);
            sym_index += 1;
            codeword = advance_codeword(codeword, cur_table_end - 1);
        }
    }

    if max_len <= table_bits {
        /* Double out to the full root size. */
        while cur_table_end < (1 << table_bits) {
            table.copy_within(0..cur_table_end, cur_table_end);
            cur_table_end *= 2;
        }
        return Ok(());
    }

    /* Remaining codewords overflow the root width and go to subtables
     * placed directly after the root table. */
    while cur_table_end < (1 << table_bits) {
        table.copy_within(0..cur_table_end, cur_table_end);
        cur_table_end *= 2;
    }

    let root_mask = (1usize << table_bits) - 1;
    let mut subtable_prefix = usize::MAX;
    let mut subtable_start = 0usize;
    let mut subtable_end = 1usize << table_bits;

    for len in (table_bits + 1)..=max_len {
        for i in 0..len_counts[len] {
            if (codeword & root_mask) != subtable_prefix {
                subtable_prefix = codeword & root_mask;
                subtable_start = subtable_end;

                /* Size the subtable for the longest codeword routed
                 * through this prefix: start at 2^(len - table_bits) and
                 * widen until the remaining codespace fills it. */
                let mut subtable_bits = len - table_bits;
                let mut codespace_used = u32::from(len_counts[len] - i);
                while codespace_used < (1u32 << subtable_bits) {
                    subtable_bits += 1;
                    codespace_used = (codespace_used << 1)
                        + u32::from(len_counts[table_bits + subtable_bits]);
                }
                subtable_end = subtable_start + (1 << subtable_bits);
                if subtable_end > table.len() {
                    /* Cannot happen while ENOUGH matches TABLEBITS; kept
                     * as a hard stop against table overwrite. */
                    return Err(InflateError::BadTree);
                }

                table[subtable_prefix] = TableEntry::subtable(
                    subtable_start as u16,
                    (table_bits + subtable_bits) as u8,
                );
            }

            /* Replicate over every longer-suffix pattern in the subtable. */
            let entry = decode_results[sorted_syms[sym_index] as usize].with_length(len as u8);
            sym_index += 1;

            let mut slot = subtable_start + (codeword >> table_bits);
            let stride = 1 << (len - table_bits);
            while slot < subtable_end {
                table[slot] = entry;
                slot += stride;
            }

            codeword = advance_codeword(codeword, (1 << len) - 1);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::entry::*;
    use super::*;

    fn build(lens: &[u8], kind: TableKind) -> Result<Vec<TableEntry>, InflateError> {
        let capacity = match kind {
            TableKind::Precode => PRECODE_ENOUGH,
            TableKind::LitLen => LITLEN_ENOUGH,
            TableKind::Offset => OFFSET_ENOUGH,
        };
        let mut table = vec![TableEntry::INVALID; capacity];
        build_decode_table(&mut table, lens, kind)?;
        Ok(table)
    }

    /* Walk a table the way the decoder does: feed a bit-reversed codeword
     * and return the selected entry. */
    fn lookup(table: &[TableEntry], kind: TableKind, code_bits: u32) -> TableEntry {
        let root_bits = kind.root_bits();
        let mut entry = table[(code_bits as usize) & ((1 << root_bits) - 1)];
        if entry.is_subtable() {
            let suffix =
                ((code_bits as usize) & ((1 << entry.length) - 1)) >> root_bits;
            entry = table[entry.info as usize + suffix];
        }
        entry
    }

    /* Bit-reverse the canonical codeword for a symbol, recomputed with the
     * RFC 1951 §3.2.2 algorithm, independently of the builder. */
    fn reversed_codeword(lens: &[u8], sym: usize) -> (u32, u8) {
        let len = lens[sym];
        assert!(len > 0);
        let mut counts = [0u32; DEFLATE_MAX_CODEWORD_LEN + 1];
        for &l in lens {
            counts[l as usize] += 1;
        }
        counts[0] = 0;
        let mut next_code = [0u32; DEFLATE_MAX_CODEWORD_LEN + 1];
        let mut code = 0u32;
        for bits in 1..=DEFLATE_MAX_CODEWORD_LEN {
            code = (code + counts[bits - 1]) << 1;
            next_code[bits] = code;
        }
        let mut canonical = 0;
        for (s, &l) in lens.iter().enumerate() {
            if l == 0 {
                continue;
            }
            if s == sym {
                canonical = next_code[l as usize];
            }
            next_code[l as usize] += 1;
        }
        let mut reversed = 0u32;
        for bit in 0..len {
            reversed |= ((canonical >> bit) & 1) << (len - 1 - bit);
        }
        (reversed, len)
    }

    #[test]
    fn fixed_litlen_structure() {
        let lens = fixed_litlen_lens();
        assert!(lens[..144].iter().all(|&l| l == 8));
        assert!(lens[144..256].iter().all(|&l| l == 9));
        assert!(lens[256..280].iter().all(|&l| l == 7));
        assert!(lens[280..].iter().all(|&l| l == 8));

        let table = build(&lens, TableKind::LitLen).unwrap();

        /* Every root index resolves to something sensible. */
        for index in 0..(1 << LITLEN_TABLEBITS) {
            let entry = table[index];
            assert!(
                entry.has_extra_bits()
                    || matches!(entry.tag, TAG_LITERAL | TAG_EOB | TAG_SUBTABLE | TAG_INVALID),
                "root index {index} has tag {:#x}",
                entry.tag
            );
            if entry.is_subtable() {
                let span = 1usize << (entry.length as usize - LITLEN_TABLEBITS);
                assert!(entry.info as usize + span <= LITLEN_ENOUGH);
            }
        }

        /* End-of-block is the 7-bit all-zero codeword. */
        let eob = lookup(&table, TableKind::LitLen, 0);
        assert_eq!(eob.tag, TAG_EOB);
        assert_eq!(eob.length, 7);

        /* Spot-check some literals against independently computed codes. */
        for sym in [0usize, 65, 143, 144, 255] {
            let (code, len) = reversed_codeword(&lens, sym);
            let entry = lookup(&table, TableKind::LitLen, code);
            assert_eq!(entry.tag, TAG_LITERAL, "sym {sym}");
            assert_eq!(entry.info, sym as u16);
            assert_eq!(entry.length, len);
        }

        /* Length code 285 decodes to base 258 with no extra bits. */
        let (code, _) = reversed_codeword(&lens, 285);
        let entry = lookup(&table, TableKind::LitLen, code);
        assert_eq!(entry.tag, 0);
        assert_eq!(entry.info, 258);
    }

    #[test]
    fn fixed_offset_structure() {
        let lens = fixed_offset_lens();
        let table = build(&lens, TableKind::Offset).unwrap();

        for sym in 0..DEFLATE_MAX_OFFSET_CODES {
            let (code, _) = reversed_codeword(&lens, sym);
            let entry = lookup(&table, TableKind::Offset, code);
            assert_eq!(entry.info, DEFLATE_OFFSET_BASE[sym]);
            assert_eq!(entry.tag, DEFLATE_OFFSET_EXTRA[sym]);
            assert_eq!(entry.length, 5);
        }

        /* Symbols 30 and 31 exist in the fixed code but are invalid. */
        let (code, _) = reversed_codeword(&lens, 30);
        assert_eq!(lookup(&table, TableKind::Offset, code).tag, TAG_INVALID);
    }

    #[test]
    fn every_symbol_round_trips_through_subtables() {
        /* A skewed code deep enough to need subtables behind a 7-bit
         * root: lengths 1, 2, .., 14, 15, 15. */
        let mut lens = [0u8; 16];
        for sym in 0..15 {
            lens[sym] = (sym + 1) as u8;
        }
        lens[15] = 15;
        let table = build(&lens, TableKind::Offset).unwrap();
        for sym in 0..16 {
            let (code, len) = reversed_codeword(&lens, sym);
            let entry = lookup(&table, TableKind::Offset, code);
            assert_eq!(entry.length, len, "sym {sym}");
            if sym < DEFLATE_MAX_OFFSET_CODES {
                assert_eq!(entry.info, DEFLATE_OFFSET_BASE[sym], "sym {sym}");
            }
        }
    }

    #[test]
    fn oversubscribed_code_rejected() {
        let mut lens = fixed_litlen_lens();
        lens[0] = 1;
        lens[1] = 1;
        lens[2] = 1;
        assert!(matches!(
            build(&lens, TableKind::LitLen),
            Err(InflateError::BadTree)
        ));
    }

    #[test]
    fn incomplete_litlen_code_rejected() {
        let mut lens = [0u8; DEFLATE_NUM_LITLEN_SYMS];
        lens[0] = 2;
        lens[256] = 2;
        /* Two 2-bit codes leave half the codespace unused. */
        assert!(matches!(
            build(&lens, TableKind::LitLen),
            Err(InflateError::BadTree)
        ));
    }

    #[test]
    fn empty_offset_code_is_all_sentinels() {
        let lens = [0u8; DEFLATE_NUM_OFFSET_SYMS];
        let table = build(&lens, TableKind::Offset).unwrap();
        assert!(table.iter().all(|e| e.tag == TAG_INVALID));
    }

    #[test]
    fn single_offset_code_leaves_error_pattern() {
        let mut lens = [0u8; DEFLATE_NUM_OFFSET_SYMS];
        lens[3] = 1;
        let table = build(&lens, TableKind::Offset).unwrap();
        for index in 0..(1 << OFFSET_TABLEBITS) {
            let entry = table[index];
            if index % 2 == 0 {
                assert_eq!(entry.info, DEFLATE_OFFSET_BASE[3]);
                assert_eq!(entry.length, 1);
            } else {
                assert_eq!(entry.tag, TAG_INVALID);
            }
        }
    }

    #[test]
    fn single_offset_code_longer_than_one_bit_rejected() {
        let mut lens = [0u8; DEFLATE_NUM_OFFSET_SYMS];
        lens[3] = 2;
        assert!(matches!(
            build(&lens, TableKind::Offset),
            Err(InflateError::BadTree)
        ));
    }

    #[test]
    fn incomplete_precode_rejected() {
        let mut lens = [0u8; DEFLATE_NUM_PRECODE_SYMS];
        lens[0] = 1;
        assert!(matches!(
            build(&lens, TableKind::Precode),
            Err(InflateError::BadTree)
        ));
    }
}
