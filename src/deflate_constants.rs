/*
 * Constants fixed by RFC 1951. Nothing here is tunable; the decode table
 * root widths live in huffman.rs next to the capacity bounds they imply.
 */

pub const DEFLATE_BLOCKTYPE_UNCOMPRESSED: u32 = 0;
pub const DEFLATE_BLOCKTYPE_STATIC_HUFFMAN: u32 = 1;
pub const DEFLATE_BLOCKTYPE_DYNAMIC_HUFFMAN: u32 = 2;

pub const DEFLATE_NUM_PRECODE_SYMS: usize = 19;
pub const DEFLATE_NUM_LITLEN_SYMS: usize = 288;
pub const DEFLATE_NUM_OFFSET_SYMS: usize = 32;

/* Largest alphabet fed to the table builder. */
pub const DEFLATE_MAX_NUM_SYMS: usize = 288;

/* HLIT may name at most 286 litlen codes, HDIST at most 30 offset codes;
 * the remaining symbols of each alphabet exist only in the fixed code. */
pub const DEFLATE_MAX_LITLEN_CODES: usize = 286;
pub const DEFLATE_MAX_OFFSET_CODES: usize = 30;

pub const DEFLATE_MAX_CODEWORD_LEN: usize = 15;
pub const DEFLATE_MAX_PRE_CODEWORD_LEN: usize = 7;

pub const DEFLATE_END_OF_BLOCK_SYM: usize = 256;

pub const DEFLATE_MIN_MATCH_LEN: usize = 3;
pub const DEFLATE_MAX_MATCH_LEN: usize = 258;

pub const DEFLATE_WINDOW_SIZE: usize = 32768;

/* The order in which code-length code lengths are transmitted. */
pub const DEFLATE_PRECODE_LENS_PERMUTATION: [u8; DEFLATE_NUM_PRECODE_SYMS] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/* Base match length and number of extra bits for litlen symbols 257..285. */
pub const DEFLATE_LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];
pub const DEFLATE_LENGTH_EXTRA: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

/* Base distance and number of extra bits for offset symbols 0..29. */
pub const DEFLATE_OFFSET_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];
pub const DEFLATE_OFFSET_EXTRA: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];
