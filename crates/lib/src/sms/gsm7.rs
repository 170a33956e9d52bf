//! GSM 03.38 default alphabet: septet unpacking and character mapping (with extension table).

const ESCAPE: u8 = 0x1B;

/// Default alphabet, indexed by septet value. Index 0x1B is the escape to the extension table.
const DEFAULT_ALPHABET: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å', //
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{1B}', 'Æ', 'æ', 'ß', 'É', //
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/', //
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?', //
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', //
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§', //
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', //
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à', //
];

fn extension_char(septet: u8) -> Option<char> {
    let c = match septet {
        0x0A => '\u{0C}',
        0x14 => '^',
        0x28 => '{',
        0x29 => '}',
        0x2F => '\\',
        0x3C => '[',
        0x3D => '~',
        0x3E => ']',
        0x40 => '|',
        0x65 => '€',
        _ => return None,
    };
    Some(c)
}

/// Unpack `count` 7-bit septets from `data` (LSB-first packing). Returns None when `data` is too short.
pub fn unpack_septets(data: &[u8], count: usize) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let bit = i * 7;
        let byte = bit / 8;
        let shift = bit % 8;
        let mut value = u16::from(*data.get(byte)?) >> shift;
        if shift > 1 {
            value |= u16::from(*data.get(byte + 1)?) << (8 - shift);
        }
        out.push((value & 0x7F) as u8);
    }
    Some(out)
}

/// Map septets to text. An escape followed by an unmapped code falls back to the default-table
/// character; a doubled escape renders as a space; a trailing escape is dropped.
pub fn septets_to_string(septets: &[u8]) -> String {
    let mut out = String::with_capacity(septets.len());
    let mut iter = septets.iter().copied();
    while let Some(s) = iter.next() {
        if s != ESCAPE {
            out.push(DEFAULT_ALPHABET[usize::from(s & 0x7F)]);
            continue;
        }
        match iter.next() {
            Some(ESCAPE) => out.push(' '),
            Some(next) => {
                out.push(extension_char(next).unwrap_or(DEFAULT_ALPHABET[usize::from(next & 0x7F)]))
            }
            None => {}
        }
    }
    out
}
