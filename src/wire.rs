// =============================================================================
// Wire codec — Avro binary encoding of the trade envelope
// =============================================================================
//
// Schema (field order is the wire contract):
//
//   record Envelope {
//     string type;
//     array<record Trade {
//       array<string> c;   // trade conditions
//       double        p;   // price
//       string        s;   // symbol
//       long          t;   // trade timestamp, ms since epoch
//       double        v;   // volume
//     }> data;
//   }
//
// Longs and lengths use zig-zag varint encoding, doubles are IEEE-754
// little-endian, strings are length-prefixed UTF-8, arrays are count-prefixed
// blocks with a zero terminator.  The decoder also accepts the negative-count
// block form (count followed by a byte size) that Avro writers may emit.
// =============================================================================

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// A single trade as carried on the wire and in vendor WebSocket JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Trade condition codes; absent on the vendor feed for plain trades.
    #[serde(rename = "c", default)]
    pub conditions: Vec<String>,
    #[serde(rename = "p")]
    pub price: f64,
    #[serde(rename = "s")]
    pub symbol: String,
    /// Trade timestamp in milliseconds since the epoch.
    #[serde(rename = "t", default)]
    pub timestamp_ms: i64,
    #[serde(rename = "v")]
    pub volume: f64,
}

/// The `{type, data[]}` frame exchanged between producer and processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type", default)]
    pub message_type: String,
    #[serde(default)]
    pub data: Vec<Trade>,
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode an envelope into its canonical binary form.
pub fn encode(envelope: &Envelope) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + envelope.data.len() * 48);
    write_string(&mut buf, &envelope.message_type);
    if !envelope.data.is_empty() {
        write_long(&mut buf, envelope.data.len() as i64);
        for trade in &envelope.data {
            write_trade(&mut buf, trade);
        }
    }
    // Zero block count terminates the array.
    write_long(&mut buf, 0);
    buf
}

fn write_trade(buf: &mut Vec<u8>, trade: &Trade) {
    if !trade.conditions.is_empty() {
        write_long(buf, trade.conditions.len() as i64);
        for c in &trade.conditions {
            write_string(buf, c);
        }
    }
    write_long(buf, 0);
    write_double(buf, trade.price);
    write_string(buf, &trade.symbol);
    write_long(buf, trade.timestamp_ms);
    write_double(buf, trade.volume);
}

fn write_long(buf: &mut Vec<u8>, value: i64) {
    // Zig-zag then base-128 varint, low bits first.
    let mut n = ((value << 1) ^ (value >> 63)) as u64;
    loop {
        let byte = (n & 0x7f) as u8;
        n >>= 7;
        if n == 0 {
            buf.push(byte);
            break;
        }
        buf.push(byte | 0x80);
    }
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_long(buf, s.len() as i64);
    buf.extend_from_slice(s.as_bytes());
}

fn write_double(buf: &mut Vec<u8>, value: f64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a binary envelope.  Trailing bytes after the envelope are an error.
pub fn decode(bytes: &[u8]) -> Result<Envelope> {
    let mut cursor = Cursor::new(bytes);
    let message_type = cursor.read_string().context("envelope type")?;
    let mut data = Vec::new();
    cursor
        .read_array(|c| {
            let trade = read_trade(c)?;
            data.push(trade);
            Ok(())
        })
        .context("envelope data array")?;

    if !cursor.is_empty() {
        bail!(
            "trailing bytes after envelope: {} of {} left",
            cursor.remaining(),
            bytes.len()
        );
    }
    Ok(Envelope { message_type, data })
}

fn read_trade(cursor: &mut Cursor<'_>) -> Result<Trade> {
    let mut conditions = Vec::new();
    cursor
        .read_array(|c| {
            conditions.push(c.read_string()?);
            Ok(())
        })
        .context("trade conditions")?;
    let price = cursor.read_double().context("trade price")?;
    let symbol = cursor.read_string().context("trade symbol")?;
    let timestamp_ms = cursor.read_long().context("trade timestamp")?;
    let volume = cursor.read_double().context("trade volume")?;
    Ok(Trade {
        conditions,
        price,
        symbol,
        timestamp_ms,
        volume,
    })
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn read_byte(&mut self) -> Result<u8> {
        let b = *self
            .bytes
            .get(self.pos)
            .context("unexpected end of input")?;
        self.pos += 1;
        Ok(b)
    }

    fn read_long(&mut self) -> Result<i64> {
        let mut n: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.read_byte()?;
            if shift >= 64 {
                bail!("varint longer than 10 bytes");
            }
            n |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        // Undo zig-zag.
        Ok(((n >> 1) as i64) ^ -((n & 1) as i64))
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_long()?;
        if len < 0 {
            bail!("negative string length {len}");
        }
        let len = len as usize;
        if self.remaining() < len {
            bail!("string length {len} exceeds remaining input");
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(std::str::from_utf8(slice)
            .context("string is not valid UTF-8")?
            .to_string())
    }

    fn read_double(&mut self) -> Result<f64> {
        if self.remaining() < 8 {
            bail!("double exceeds remaining input");
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.bytes[self.pos..self.pos + 8]);
        self.pos += 8;
        Ok(f64::from_le_bytes(raw))
    }

    /// Read an array as a sequence of count-prefixed blocks, invoking `item`
    /// once per element, until the zero-count terminator.
    fn read_array(&mut self, mut item: impl FnMut(&mut Self) -> Result<()>) -> Result<()> {
        loop {
            let mut count = self.read_long()?;
            if count == 0 {
                return Ok(());
            }
            if count < 0 {
                // Negative count form: the block byte size follows; we do not
                // need it for sequential reads.
                let _block_bytes = self.read_long()?;
                count = -count;
            }
            for _ in 0..count {
                item(self)?;
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trade(symbol: &str, price: f64) -> Trade {
        Trade {
            conditions: vec!["1".into(), "12".into()],
            price,
            symbol: symbol.into(),
            timestamp_ms: 1_704_207_000_123,
            volume: 42.5,
        }
    }

    #[test]
    fn roundtrip_identity() {
        let envelope = Envelope {
            message_type: "trade".into(),
            data: vec![sample_trade("AAPL", 185.32), sample_trade("MSFT", 410.0)],
        };
        let decoded = decode(&encode(&envelope)).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn roundtrip_zero_values() {
        let envelope = Envelope {
            message_type: "trade".into(),
            data: vec![Trade {
                conditions: vec![],
                price: 0.0,
                symbol: "X".into(),
                timestamp_ms: 0,
                volume: 0.0,
            }],
        };
        let decoded = decode(&encode(&envelope)).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn roundtrip_empty_data() {
        let envelope = Envelope {
            message_type: "ping".into(),
            data: vec![],
        };
        let decoded = decode(&encode(&envelope)).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn trailing_bytes_are_an_error() {
        let mut bytes = encode(&Envelope {
            message_type: "trade".into(),
            data: vec![sample_trade("AAPL", 1.0)],
        });
        bytes.push(0x00);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn truncated_input_is_an_error() {
        let bytes = encode(&Envelope {
            message_type: "trade".into(),
            data: vec![sample_trade("AAPL", 1.0)],
        });
        assert!(decode(&bytes[..bytes.len() - 3]).is_err());
    }

    #[test]
    fn negative_block_count_form_decodes() {
        // Hand-build an envelope whose data array uses the negative-count
        // block form: count = -1, then block byte size, then the item.
        let trade = Trade {
            conditions: vec![],
            price: 2.0,
            symbol: "A".into(),
            timestamp_ms: 5,
            volume: 3.0,
        };
        let mut item = Vec::new();
        write_trade(&mut item, &trade);

        let mut bytes = Vec::new();
        write_string(&mut bytes, "trade");
        write_long(&mut bytes, -1);
        write_long(&mut bytes, item.len() as i64);
        bytes.extend_from_slice(&item);
        write_long(&mut bytes, 0);

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.data, vec![trade]);
    }

    #[test]
    fn varint_edge_values_roundtrip() {
        for value in [0i64, -1, 1, 63, -64, 64, i64::MAX, i64::MIN] {
            let mut buf = Vec::new();
            write_long(&mut buf, value);
            let mut cursor = Cursor::new(&buf);
            assert_eq!(cursor.read_long().unwrap(), value);
            assert!(cursor.is_empty());
        }
    }

    #[test]
    fn vendor_json_maps_onto_envelope() {
        let json = r#"{
            "type": "trade",
            "data": [
                {"c": ["1"], "p": 185.32, "s": "AAPL", "t": 1704207000123, "v": 10.0},
                {"p": 410.0, "s": "MSFT", "v": 2.0}
            ]
        }"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.message_type, "trade");
        assert_eq!(envelope.data.len(), 2);
        assert!(envelope.data[1].conditions.is_empty());
        assert_eq!(envelope.data[1].timestamp_ms, 0);

        let decoded = decode(&encode(&envelope)).unwrap();
        assert_eq!(decoded, envelope);
    }
}
