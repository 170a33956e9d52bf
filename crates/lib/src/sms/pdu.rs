//! 3GPP TS 23.040 SMS-DELIVER decoding.
//!
//! Input is a PDU as handed over by the platform: SMSC address field first, then the TPDU.
//! Only the fields needed to display a message are interpreted (originating address, coding,
//! service-centre timestamp, user data header, user data).

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};

use super::gsm7;
use super::message::{ConcatInfo, DecodedSegment};

/// Format tag for GSM/UMTS PDUs.
pub const FORMAT_3GPP: &str = "3gpp";
/// Format tag for CDMA PDUs (not supported).
pub const FORMAT_3GPP2: &str = "3gpp2";

const TP_MTI_MASK: u8 = 0x03;
const TP_MTI_DELIVER: u8 = 0x00;
const TP_UDHI: u8 = 0x40;

const TON_INTERNATIONAL: u8 = 0x01;
const TON_ALPHANUMERIC: u8 = 0x05;

const IE_CONCAT_8BIT: u8 = 0x00;
const IE_CONCAT_16BIT: u8 = 0x08;

/// Why a segment could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unsupported segment format: {0}")]
    UnsupportedFormat(String),
    #[error("pdu truncated in {0}")]
    Truncated(&'static str),
    #[error("unsupported message type indicator: {0:#04x}")]
    UnsupportedMessageType(u8),
    #[error("compressed user data is not supported")]
    CompressedText,
}

/// Encoding scheme selected by the segment format tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsFormat {
    ThreeGpp,
}

impl SmsFormat {
    /// Resolve a platform format tag. An absent tag means 3GPP.
    pub fn from_tag(tag: Option<&str>) -> Result<Self, DecodeError> {
        match tag.map(str::trim) {
            None => Ok(SmsFormat::ThreeGpp),
            Some(t) if t.eq_ignore_ascii_case(FORMAT_3GPP) => Ok(SmsFormat::ThreeGpp),
            Some(t) => Err(DecodeError::UnsupportedFormat(t.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Alphabet {
    Gsm7,
    EightBit,
    Ucs2,
    Unknown,
}

/// Map TP-DCS to an alphabet (3GPP TS 23.038 section 4).
fn alphabet(dcs: u8) -> Result<Alphabet, DecodeError> {
    let a = match dcs >> 4 {
        0x0..=0x7 => {
            if dcs & 0x20 != 0 {
                return Err(DecodeError::CompressedText);
            }
            match (dcs >> 2) & 0x03 {
                0x01 => Alphabet::EightBit,
                0x02 => Alphabet::Ucs2,
                _ => Alphabet::Gsm7,
            }
        }
        0xC | 0xD => Alphabet::Gsm7,
        0xE => Alphabet::Ucs2,
        0xF => {
            if dcs & 0x04 == 0 {
                Alphabet::Gsm7
            } else {
                Alphabet::EightBit
            }
        }
        _ => Alphabet::Unknown,
    };
    Ok(a)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn byte(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        Ok(self.take(1, field)?[0])
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or(DecodeError::Truncated(field))?;
        let data = self.data;
        let out = &data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn rest(&self) -> &'a [u8] {
        let data = self.data;
        &data[self.pos..]
    }
}

/// Decode one segment with the given format tag.
pub fn decode_segment(payload: &[u8], format: Option<&str>) -> Result<DecodedSegment, DecodeError> {
    match SmsFormat::from_tag(format)? {
        SmsFormat::ThreeGpp => decode_deliver(payload),
    }
}

fn decode_deliver(pdu: &[u8]) -> Result<DecodedSegment, DecodeError> {
    let mut r = Reader::new(pdu);
    let smsc_len = r.byte("smsc length")?;
    r.take(usize::from(smsc_len), "smsc address")?;

    let first = r.byte("first octet")?;
    if first & TP_MTI_MASK != TP_MTI_DELIVER {
        return Err(DecodeError::UnsupportedMessageType(first & TP_MTI_MASK));
    }
    let has_header = first & TP_UDHI != 0;

    let address = read_address(&mut r)?;
    let _pid = r.byte("protocol identifier")?;
    let dcs = r.byte("data coding scheme")?;
    let scts = r.take(7, "service centre timestamp")?;
    let udl = usize::from(r.byte("user data length")?);
    let ud = r.rest();

    let alphabet = alphabet(dcs)?;
    let (header, header_len) = if has_header {
        let udhl = usize::from(*ud.first().ok_or(DecodeError::Truncated("user data header"))?);
        let ies = ud
            .get(1..1 + udhl)
            .ok_or(DecodeError::Truncated("user data header"))?;
        (Some(ies), udhl + 1)
    } else {
        (None, 0)
    };
    let concat = header.map(parse_concat).transpose()?.flatten();

    let text = match alphabet {
        Alphabet::Gsm7 => {
            let header_septets = (header_len * 8 + 6) / 7;
            if header_septets > udl {
                return Err(DecodeError::Truncated("user data"));
            }
            let septets = gsm7::unpack_septets(ud, udl).ok_or(DecodeError::Truncated("user data"))?;
            Some(gsm7::septets_to_string(&septets[header_septets..]))
        }
        Alphabet::Ucs2 => {
            let body = octet_body(ud, udl, header_len)?;
            if body.len() % 2 != 0 {
                return Err(DecodeError::Truncated("user data"));
            }
            let units: Vec<u16> = body
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            Some(String::from_utf16_lossy(&units))
        }
        Alphabet::EightBit | Alphabet::Unknown => {
            octet_body(ud, udl, header_len)?;
            None
        }
    };

    Ok(DecodedSegment {
        address,
        text,
        service_centre_time: parse_timestamp(scts),
        concat,
    })
}

fn octet_body(ud: &[u8], udl: usize, header_len: usize) -> Result<&[u8], DecodeError> {
    if header_len > udl {
        return Err(DecodeError::Truncated("user data"));
    }
    ud.get(header_len..udl).ok_or(DecodeError::Truncated("user data"))
}

/// TP-OA: length in semi-octets, type of address, then the address value.
fn read_address(r: &mut Reader<'_>) -> Result<Option<String>, DecodeError> {
    let digits = usize::from(r.byte("originating address length")?);
    let toa = r.byte("originating address type")?;
    let raw = r.take((digits + 1) / 2, "originating address")?;
    let ton = (toa >> 4) & 0x07;

    let address = if ton == TON_ALPHANUMERIC {
        let septets = gsm7::unpack_septets(raw, digits * 4 / 7)
            .ok_or(DecodeError::Truncated("originating address"))?;
        gsm7::septets_to_string(&septets)
    } else {
        let mut s = semi_octets(raw, digits);
        if ton == TON_INTERNATIONAL && !s.is_empty() {
            s.insert(0, '+');
        }
        s
    };
    Ok(Some(address).filter(|a| !a.is_empty()))
}

fn semi_octets(raw: &[u8], digits: usize) -> String {
    let mut out = String::with_capacity(digits);
    for nibble in raw.iter().flat_map(|b| [b & 0x0F, b >> 4]).take(digits) {
        let c = match nibble {
            0..=9 => char::from(b'0' + nibble),
            0xA => '*',
            0xB => '#',
            0xC => 'a',
            0xD => 'b',
            0xE => 'c',
            _ => break,
        };
        out.push(c);
    }
    out
}

/// Swapped-nibble BCD byte to integer (low nibble is the tens digit).
fn bcd(b: u8) -> u32 {
    u32::from(b & 0x0F) * 10 + u32::from(b >> 4)
}

/// TP-SCTS: yy mm dd hh mm ss tz; tz in quarter hours, sign in bit 3. Invalid values yield None.
fn parse_timestamp(scts: &[u8]) -> Option<DateTime<FixedOffset>> {
    let year = bcd(scts[0]);
    let year = if year >= 90 { 1900 + year } else { 2000 + year };
    let naive = NaiveDate::from_ymd_opt(year as i32, bcd(scts[1]), bcd(scts[2]))?.and_hms_opt(
        bcd(scts[3]),
        bcd(scts[4]),
        bcd(scts[5]),
    )?;
    let quarters = bcd(scts[6] & !0x08) as i32;
    let quarters = if scts[6] & 0x08 != 0 {
        -quarters
    } else {
        quarters
    };
    let offset = FixedOffset::east_opt(quarters * 15 * 60)?;
    offset.from_local_datetime(&naive).single()
}

/// Walk the information elements; returns the concatenation element when present.
fn parse_concat(ies: &[u8]) -> Result<Option<ConcatInfo>, DecodeError> {
    let mut r = Reader::new(ies);
    let mut found = None;
    while !r.rest().is_empty() {
        let id = r.byte("user data header")?;
        let len = usize::from(r.byte("user data header")?);
        let data = r.take(len, "user data header")?;
        match (id, data) {
            (IE_CONCAT_8BIT, [reference, total, sequence]) => {
                found = Some(ConcatInfo {
                    reference: u16::from(*reference),
                    total: *total,
                    sequence: *sequence,
                });
            }
            (IE_CONCAT_16BIT, [hi, lo, total, sequence]) => {
                found = Some(ConcatInfo {
                    reference: u16::from_be_bytes([*hi, *lo]),
                    total: *total,
                    sequence: *sequence,
                });
            }
            _ => {}
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn pdu(hex_str: &str) -> Vec<u8> {
        hex::decode(hex_str).unwrap()
    }

    const HOW_ARE_YOU: &str =
        "07911326040000F0040B911346610089F60000208062917314080CC8F71D14969741F977FD07";

    #[test]
    fn decodes_international_gsm7_deliver() {
        let seg = decode_segment(&pdu(HOW_ARE_YOU), Some("3gpp")).unwrap();
        assert_eq!(seg.address.as_deref(), Some("+31641600986"));
        assert_eq!(seg.text.as_deref(), Some("How are you?"));
        assert!(seg.concat.is_none());
        let ts = seg.service_centre_time.unwrap();
        assert_eq!(
            (ts.year(), ts.month(), ts.day(), ts.hour(), ts.minute(), ts.second()),
            (2002, 8, 26, 19, 37, 41)
        );
    }

    #[test]
    fn missing_format_tag_means_3gpp() {
        let seg = decode_segment(&pdu(HOW_ARE_YOU), None).unwrap();
        assert_eq!(seg.text.as_deref(), Some("How are you?"));
    }

    #[test]
    fn decodes_concatenated_part_with_header() {
        let seg = decode_segment(
            &pdu("07911326040000F0440B915155214365F70000521070610214800D050003A70201906536FB0D02"),
            Some("3gpp"),
        )
        .unwrap();
        assert_eq!(seg.address.as_deref(), Some("+15551234567"));
        assert_eq!(seg.text.as_deref(), Some("Hello "));
        assert_eq!(
            seg.concat,
            Some(ConcatInfo {
                reference: 0xA7,
                total: 2,
                sequence: 1
            })
        );
        let ts = seg.service_centre_time.unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 2 * 3600);
        assert_eq!((ts.year(), ts.month(), ts.day()), (2025, 1, 7));
    }

    #[test]
    fn empty_address_is_absent() {
        let seg = decode_segment(
            &pdu("07911326040000F04400810000521070610214800C050003A70202EE6F399B0C"),
            Some("3gpp"),
        )
        .unwrap();
        assert_eq!(seg.address, None);
        assert_eq!(seg.text.as_deref(), Some("world"));
        assert_eq!(seg.concat.map(|c| c.sequence), Some(2));
    }

    #[test]
    fn decodes_alphanumeric_sender() {
        let seg = decode_segment(
            &pdu("07911326040000F00410D050747A8E1686DD6B0000521070610214800FD9775D0E1ABFC9651D28269BD100"),
            Some("3gpp"),
        )
        .unwrap();
        assert_eq!(seg.address.as_deref(), Some("PhishBank"));
        assert_eq!(seg.text.as_deref(), Some("Your code: 1234"));
    }

    #[test]
    fn decodes_ucs2_with_surrogate_pair() {
        let seg = decode_segment(
            &pdu("07911326040000F0040C9144770009103200085210706102148012041F044004380432043504420020D83DDC4B"),
            Some("3gpp"),
        )
        .unwrap();
        assert_eq!(seg.address.as_deref(), Some("+447700900123"));
        assert_eq!(seg.text.as_deref(), Some("Привет 👋"));
    }

    #[test]
    fn decodes_extension_characters_and_national_number() {
        let seg = decode_segment(
            &pdu("07911326040000F0040781551532F40000521070610214801750797A5CD6816A9B3268C37BAF373ED00685DFA400"),
            Some("3gpp"),
        )
        .unwrap();
        assert_eq!(seg.address.as_deref(), Some("5551234"));
        assert_eq!(seg.text.as_deref(), Some("Price: 5€ [ok] {x}"));
    }

    #[test]
    fn eight_bit_payload_has_no_text() {
        let seg = decode_segment(
            &pdu("07911326040000F0040B915155001011F100045210706102148003010203"),
            Some("3gpp"),
        )
        .unwrap();
        assert_eq!(seg.address.as_deref(), Some("+15550001111"));
        assert_eq!(seg.text, None);
    }

    #[test]
    fn rejects_3gpp2_and_unknown_tags() {
        let bytes = pdu(HOW_ARE_YOU);
        assert_eq!(
            decode_segment(&bytes, Some(FORMAT_3GPP2)),
            Err(DecodeError::UnsupportedFormat("3gpp2".into()))
        );
        assert!(matches!(
            decode_segment(&bytes, Some("bogus")),
            Err(DecodeError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn truncated_pdus_fail() {
        let full = pdu(HOW_ARE_YOU);
        assert!(matches!(
            decode_segment(&full[..full.len() - 2], Some("3gpp")),
            Err(DecodeError::Truncated("user data"))
        ));
        assert!(matches!(
            decode_segment(&full[..12], Some("3gpp")),
            Err(DecodeError::Truncated(_))
        ));
        assert!(matches!(
            decode_segment(&[], Some("3gpp")),
            Err(DecodeError::Truncated("smsc length"))
        ));
        assert!(decode_segment(&[0xFF, 0x01, 0x02], Some("3gpp")).is_err());
    }

    #[test]
    fn ucs2_split_code_unit_fails() {
        // DCS 0x08, UDL 3: "A" plus half of the next code unit
        let bytes = pdu("07911326040000F0040B911346610089F600085210706102148003004100");
        assert_eq!(
            decode_segment(&bytes, Some("3gpp")),
            Err(DecodeError::Truncated("user data"))
        );
    }

    #[test]
    fn rejects_non_deliver_message_types() {
        let mut bytes = pdu(HOW_ARE_YOU);
        bytes[8] = 0x02; // first octet: SMS-STATUS-REPORT
        assert_eq!(
            decode_segment(&bytes, Some("3gpp")),
            Err(DecodeError::UnsupportedMessageType(0x02))
        );
    }

    #[test]
    fn rejects_compressed_text() {
        let mut bytes = pdu(HOW_ARE_YOU);
        bytes[8 + 1 + 1 + 1 + 6 + 1] = 0x20; // TP-DCS
        assert_eq!(
            decode_segment(&bytes, Some("3gpp")),
            Err(DecodeError::CompressedText)
        );
    }

    #[test]
    fn dcs_groups_map_to_alphabets() {
        assert_eq!(alphabet(0x00), Ok(Alphabet::Gsm7));
        assert_eq!(alphabet(0x04), Ok(Alphabet::EightBit));
        assert_eq!(alphabet(0x08), Ok(Alphabet::Ucs2));
        assert_eq!(alphabet(0xF0), Ok(Alphabet::Gsm7));
        assert_eq!(alphabet(0xF4), Ok(Alphabet::EightBit));
        assert_eq!(alphabet(0xE0), Ok(Alphabet::Ucs2));
        assert_eq!(alphabet(0x84), Ok(Alphabet::Unknown));
    }

    #[test]
    fn negative_timestamp_zone() {
        // 2024-12-31 23:59:58, zone -05:00 (20 quarters, sign bit set)
        let ts = parse_timestamp(&[0x42, 0x21, 0x13, 0x32, 0x95, 0x85, 0x0A]).unwrap();
        assert_eq!(ts.offset().local_minus_utc(), -5 * 3600);
        assert_eq!((ts.year(), ts.month(), ts.day()), (2024, 12, 31));
        assert!(parse_timestamp(&[0x42, 0x31, 0x13, 0, 0, 0, 0]).is_none());
    }
}
