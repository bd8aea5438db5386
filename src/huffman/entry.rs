/*
 * Decode table entry. Each slot of a root table or subtable is one of these;
 * the tag tells the decoder what the info field holds and how to proceed:
 *
 *   0..=13        length/distance code: info is the base value, tag is the
 *                 number of extra bits that follow the codeword
 *   TAG_LITERAL   info is a literal byte (litlen tables only)
 *   TAG_EOB       end-of-block marker (litlen tables only)
 *   TAG_PRESYM    info is a code-length symbol 0..18 (precode table only)
 *   TAG_SUBTABLE  info is the subtable base index; length is the full bit
 *                 width of the longest codeword routed through this slot
 *   TAG_INVALID   bit pattern not assigned by the code
 *
 * length is the number of reservoir bits consumed when the entry is
 * selected: the codeword length for direct entries, the total codeword
 * length for entries reached through a subtable.
 */

pub const TAG_MAX_EXTRA: u8 = 13;

pub const TAG_LITERAL: u8 = 0x20;
pub const TAG_EOB: u8 = 0x21;
pub const TAG_PRESYM: u8 = 0x22;
pub const TAG_SUBTABLE: u8 = 0x40;
pub const TAG_INVALID: u8 = 0x41;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TableEntry {
    pub info: u16,
    pub tag: u8,
    pub length: u8,
}

impl TableEntry {
    /* Unassigned patterns consume one bit before the error is raised, the
     * same as a real codeword would; see decode_symbol in inflate.rs. */
    pub const INVALID: TableEntry = TableEntry {
        info: 0,
        tag: TAG_INVALID,
        length: 1,
    };

    #[inline(always)]
    pub const fn literal(byte: u8) -> Self {
        Self {
            info: byte as u16,
            tag: TAG_LITERAL,
            length: 0,
        }
    }

    #[inline(always)]
    pub const fn end_of_block() -> Self {
        Self {
            info: 0,
            tag: TAG_EOB,
            length: 0,
        }
    }

    #[inline(always)]
    pub const fn presym(sym: u8) -> Self {
        Self {
            info: sym as u16,
            tag: TAG_PRESYM,
            length: 0,
        }
    }

    /* Length or distance code: base value plus extra-bit count. */
    #[inline(always)]
    pub const fn with_base(base: u16, extra_bits: u8) -> Self {
        Self {
            info: base,
            tag: extra_bits,
            length: 0,
        }
    }

    pub const fn subtable(base_index: u16, total_bits: u8) -> Self {
        Self {
            info: base_index,
            tag: TAG_SUBTABLE,
            length: total_bits,
        }
    }

    /* Stamp the codeword length onto a template from the decode-results
     * arrays, producing the entry actually stored in the table. */
    #[inline(always)]
    pub const fn with_length(self, length: u8) -> Self {
        Self {
            info: self.info,
            tag: self.tag,
            length,
        }
    }

    #[inline(always)]
    pub const fn is_subtable(self) -> bool {
        self.tag == TAG_SUBTABLE
    }

    #[inline(always)]
    pub const fn has_extra_bits(self) -> bool {
        self.tag <= TAG_MAX_EXTRA
    }
}
