use chrono::{DateTime, Utc};
use std::io::{self, Read};

pub(crate) fn read_array<R: Read, const N: usize>(reader: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

pub(crate) fn to_hex_string(data: &[u8]) -> String {
    let mut output = String::with_capacity(data.len() * 2);

    for byte in data {
        output.push_str(&format!("{:02x}", byte))
    }

    output
}

/// Decode a field as signed little-endian seconds since the epoch.
/// Anything that is not exactly four bytes decodes as the zero timestamp.
pub(crate) fn decode_time_field(data: &[u8]) -> DateTime<Utc> {
    if data.len() != 4 {
        return DateTime::<Utc>::default();
    }
    let seconds = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    DateTime::from_timestamp(i64::from(seconds), 0).unwrap_or_default()
}

pub(crate) fn encode_time_field(time: DateTime<Utc>) -> [u8; 4] {
    (time.timestamp() as i32).to_le_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn hex_rendering_pads_small_bytes() {
        assert_eq!(to_hex_string(&[0x00, 0x0f, 0xa0, 0xff]), "000fa0ff");
        assert_eq!(to_hex_string(&[]), "");
    }

    #[test]
    fn time_decoding_requires_four_bytes() {
        let epoch = DateTime::<Utc>::default();
        assert_eq!(decode_time_field(&[]), epoch);
        assert_eq!(decode_time_field(&[1, 2, 3]), epoch);
        assert_eq!(decode_time_field(&[1, 2, 3, 4, 5]), epoch);
        assert_eq!(decode_time_field(&[0, 0, 0, 0]), epoch);
    }

    #[test]
    fn time_round_trips_through_field_bytes() {
        let time = Utc.with_ymd_and_hms(2009, 2, 13, 23, 31, 30).unwrap();
        assert_eq!(decode_time_field(&encode_time_field(time)), time);
        // 0x4995_29f2 == 1234567890
        assert_eq!(encode_time_field(time), [0xf2, 0x29, 0x95, 0x49]);
    }

    #[test]
    fn time_decoding_is_signed() {
        let before_epoch = decode_time_field(&[0xff, 0xff, 0xff, 0xff]);
        assert_eq!(before_epoch.timestamp(), -1);
    }
}
