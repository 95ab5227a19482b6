//! Single-byte allele alphabet and its ordinal codec.
//!
//! Genotype cells hold two raw allele bytes (father, mother). Count tables
//! are indexed by a compact ordinal instead, so every legal byte maps to a
//! position in `0..ALPHABET_SIZE` through a 256-entry table built at compile
//! time.

/// Ordered pair of allele bytes for one sample at one marker.
pub type Genotype = [u8; 2];

/// Alleles accepted in genotype cells, in ordinal order.
pub const ALPHABET: [u8; 11] = [
    b'A', b'C', b'G', b'T', b'0', b'-', b'1', b'2', b'3', b'4', b'B',
];

/// Number of distinct allele symbols.
pub const ALPHABET_SIZE: usize = ALPHABET.len();

/// The "missing / unknown" allele symbol.
pub const MISSING: u8 = b'0';

/// Ordinal of [`MISSING`].
pub const MISSING_ORDINAL: usize = 4;

/// Genotype of a sample with no call at a marker.
pub const MISSING_GENOTYPE: Genotype = [MISSING, MISSING];

const LOOKUP: [i8; 256] = build_lookup();

const _: () = assert!(LOOKUP[MISSING as usize] == MISSING_ORDINAL as i8);

const fn build_lookup() -> [i8; 256] {
    let mut table = [-1i8; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as i8;
        i += 1;
    }
    table
}

/// Ordinal of `symbol`, or `None` if the byte is not in the alphabet.
///
/// Importers use this to reject foreign data before it reaches the
/// statistics code.
#[inline]
pub fn try_ordinal(symbol: u8) -> Option<usize> {
    let ord = LOOKUP[symbol as usize];
    if ord < 0 {
        None
    } else {
        Some(ord as usize)
    }
}

/// Ordinal of `symbol`.
///
/// # Panics
/// If `symbol` is not part of [`ALPHABET`]. Genotype sources validate their
/// bytes on load, so reaching this is a codec mismatch.
#[inline]
pub fn ordinal_of(symbol: u8) -> usize {
    match try_ordinal(symbol) {
        Some(ord) => ord,
        None => panic!(
            "allele byte 0x{:02x} ({:?}) is not part of the allele alphabet",
            symbol, symbol as char
        ),
    }
}

/// Allele byte at `ordinal`.
#[inline]
pub fn symbol_of(ordinal: usize) -> u8 {
    ALPHABET[ordinal]
}

#[inline]
pub fn is_missing(symbol: u8) -> bool {
    symbol == MISSING
}

/// Normalize a textual allele (e.g. from a .bim file) to an alphabet byte.
///
/// Lower-case nucleotides are accepted; anything longer than one byte or
/// outside the alphabet returns `None`.
pub fn parse_allele(text: &str) -> Option<u8> {
    let bytes = text.as_bytes();
    if bytes.len() != 1 {
        return None;
    }
    let symbol = bytes[0].to_ascii_uppercase();
    try_ordinal(symbol).map(|_| symbol)
}

/// Check that both bytes of a genotype are legal.
pub fn is_valid_genotype(gt: &Genotype) -> bool {
    try_ordinal(gt[0]).is_some() && try_ordinal(gt[1]).is_some()
}
