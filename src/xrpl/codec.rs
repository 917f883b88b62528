//! Decoder for the canonical binary serialization of ledger entries.
//!
//! Entries are a sequence of `(field header, value)` pairs sorted by type
//! code and field code. `LedgerEntryType` (UInt16, field 1) has the lowest
//! sort key of every entry field, so it is always the first field and the
//! entry type can be read without decoding the rest of the object.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of data at byte {0}")]
    UnexpectedEnd(usize),

    #[error("unsupported field type {type_code} at byte {offset}")]
    UnsupportedType { type_code: u16, offset: usize },

    #[error("invalid length prefix {prefix:#04x} at byte {offset}")]
    InvalidLength { prefix: u8, offset: usize },

    #[error("invalid Vector256 length {0}")]
    InvalidVectorLength(usize),

    #[error("invalid account id length {0}")]
    InvalidAccountId(usize),

    #[error("invalid hex data: {0}")]
    Hex(String),

    #[error("entry does not start with LedgerEntryType")]
    MissingEntryType,

    #[error("missing field {0}")]
    MissingField(&'static str),

    #[error("field {0} is not a native XRP amount")]
    NonNativeAmount(&'static str),

    #[error("unexpected type for field {0}")]
    UnexpectedFieldType(&'static str),
}

/// Sort key of a serialized field
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId {
    pub type_code: u16,
    pub field_code: u16,
}

impl FieldId {
    pub const fn new(type_code: u16, field_code: u16) -> Self {
        Self { type_code, field_code }
    }
}

pub mod fields {
    use super::FieldId;

    pub const LEDGER_ENTRY_TYPE: FieldId = FieldId::new(1, 1);
    pub const AMOUNT: FieldId = FieldId::new(6, 1);
    pub const BALANCE: FieldId = FieldId::new(6, 2);
    pub const MESSAGE_KEY: FieldId = FieldId::new(7, 2);
    pub const ACCOUNT: FieldId = FieldId::new(8, 1);
    pub const DESTINATION: FieldId = FieldId::new(8, 3);
    pub const OBJECT_END: FieldId = FieldId::new(14, 1);
    pub const ARRAY_END: FieldId = FieldId::new(15, 1);
}

mod type_codes {
    pub const UINT16: u16 = 1;
    pub const UINT32: u16 = 2;
    pub const UINT64: u16 = 3;
    pub const HASH128: u16 = 4;
    pub const HASH256: u16 = 5;
    pub const AMOUNT: u16 = 6;
    pub const BLOB: u16 = 7;
    pub const ACCOUNT_ID: u16 = 8;
    pub const NUMBER: u16 = 9;
    pub const OBJECT: u16 = 14;
    pub const ARRAY: u16 = 15;
    pub const UINT8: u16 = 16;
    pub const HASH160: u16 = 17;
    pub const PATH_SET: u16 = 18;
    pub const VECTOR256: u16 = 19;
    pub const UINT96: u16 = 20;
    pub const HASH192: u16 = 21;
    pub const UINT384: u16 = 22;
    pub const UINT512: u16 = 23;
    pub const ISSUE: u16 = 24;
    pub const XCHAIN_BRIDGE: u16 = 25;
    pub const CURRENCY: u16 = 26;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Amount {
    /// XRP amount in drops
    Native { drops: u64, positive: bool },
    /// Issued currency amount (value, currency, issuer), kept raw
    Issued(Vec<u8>),
    /// Multi-purpose token amount, kept raw
    Mpt(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    /// Fixed width values (hashes, currencies, numbers) kept as raw bytes
    Fixed(Vec<u8>),
    Amount(Amount),
    Blob(Vec<u8>),
    AccountId([u8; 20]),
    Object(Vec<(FieldId, FieldValue)>),
    Array(Vec<(FieldId, FieldValue)>),
    Vector256(Vec<[u8; 32]>),
    PathSet(Vec<u8>),
    Issue(Vec<u8>),
    XChainBridge(Vec<u8>),
}

const NATIVE_FLAG: u8 = 0x80;
const POSITIVE_FLAG: u8 = 0x40;
const MPT_FLAG: u8 = 0x20;
const NATIVE_MASK: u64 = 0x3FFF_FFFF_FFFF_FFFF;

const ISSUED_AMOUNT_LEN: usize = 48;
const MPT_AMOUNT_LEN: usize = 33;

/// Account field used as the second half of an MPT issue
const NO_ACCOUNT: [u8; 20] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];

const PATH_END: u8 = 0x00;
const PATH_SEPARATOR: u8 = 0xFF;
const PATH_STEP_ACCOUNT: u8 = 0x01;
const PATH_STEP_CURRENCY: u8 = 0x10;
const PATH_STEP_ISSUER: u8 = 0x20;

/// Cursor over a serialized object
pub struct BinaryParser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn is_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEnd(self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos.checked_add(len).ok_or(CodecError::UnexpectedEnd(self.pos))?;
        if end > self.data.len() {
            return Err(CodecError::UnexpectedEnd(self.data.len()));
        }
        let data: &'a [u8] = self.data;
        self.pos = end;
        Ok(&data[end - len..end])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_field_id(&mut self) -> Result<FieldId, CodecError> {
        let header = self.read_u8()?;
        let mut type_code = (header >> 4) as u16;
        let mut field_code = (header & 0x0F) as u16;

        if type_code == 0 {
            type_code = self.read_u8()? as u16;
        }
        if field_code == 0 {
            field_code = self.read_u8()? as u16;
        }

        Ok(FieldId::new(type_code, field_code))
    }

    fn read_vl_length(&mut self) -> Result<usize, CodecError> {
        let offset = self.pos;
        let b1 = self.read_u8()? as usize;

        match b1 {
            0..=192 => Ok(b1),
            193..=240 => {
                let b2 = self.read_u8()? as usize;
                Ok(193 + (b1 - 193) * 256 + b2)
            }
            241..=254 => {
                let b2 = self.read_u8()? as usize;
                let b3 = self.read_u8()? as usize;
                Ok(12481 + (b1 - 241) * 65536 + b2 * 256 + b3)
            }
            _ => Err(CodecError::InvalidLength { prefix: b1 as u8, offset }),
        }
    }

    fn read_vl(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.read_vl_length()?;
        self.read_bytes(len)
    }

    fn read_amount(&mut self) -> Result<Amount, CodecError> {
        let first = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEnd(self.pos))?;

        if first & NATIVE_FLAG != 0 {
            return Ok(Amount::Issued(self.read_bytes(ISSUED_AMOUNT_LEN)?.to_vec()));
        }
        if first & MPT_FLAG != 0 {
            return Ok(Amount::Mpt(self.read_bytes(MPT_AMOUNT_LEN)?.to_vec()));
        }

        let raw = u64::from_be_bytes(self.read_array::<8>()?);
        Ok(Amount::Native {
            drops: raw & NATIVE_MASK,
            positive: first & POSITIVE_FLAG != 0,
        })
    }

    fn read_issue(&mut self) -> Result<Vec<u8>, CodecError> {
        let mut issue = self.read_bytes(20)?.to_vec();
        if issue.iter().all(|b| *b == 0) {
            return Ok(issue);
        }

        let second = self.read_array::<20>()?;
        issue.extend_from_slice(&second);
        if second == NO_ACCOUNT {
            issue.extend_from_slice(self.read_bytes(4)?);
        }
        Ok(issue)
    }

    fn read_path_set(&mut self) -> Result<Vec<u8>, CodecError> {
        let start = self.pos;
        loop {
            let step = self.read_u8()?;
            if step == PATH_END {
                break;
            }
            if step == PATH_SEPARATOR {
                continue;
            }
            if step & PATH_STEP_ACCOUNT != 0 {
                self.read_bytes(20)?;
            }
            if step & PATH_STEP_CURRENCY != 0 {
                self.read_bytes(20)?;
            }
            if step & PATH_STEP_ISSUER != 0 {
                self.read_bytes(20)?;
            }
        }
        Ok(self.data[start..self.pos].to_vec())
    }

    fn read_account_id(&mut self) -> Result<[u8; 20], CodecError> {
        let bytes = self.read_vl()?;
        bytes.try_into().map_err(|_| CodecError::InvalidAccountId(bytes.len()))
    }

    fn read_fields_until(&mut self, end: FieldId) -> Result<Vec<(FieldId, FieldValue)>, CodecError> {
        let mut fields = Vec::new();
        loop {
            let id = self.read_field_id()?;
            if id == end {
                return Ok(fields);
            }
            let value = self.read_field_value(id)?;
            fields.push((id, value));
        }
    }

    pub fn read_field_value(&mut self, id: FieldId) -> Result<FieldValue, CodecError> {
        use type_codes::*;

        let offset = self.pos;
        let value = match id.type_code {
            UINT8 => FieldValue::UInt8(self.read_u8()?),
            UINT16 => FieldValue::UInt16(u16::from_be_bytes(self.read_array()?)),
            UINT32 => FieldValue::UInt32(u32::from_be_bytes(self.read_array()?)),
            UINT64 => FieldValue::UInt64(u64::from_be_bytes(self.read_array()?)),
            HASH128 => FieldValue::Fixed(self.read_bytes(16)?.to_vec()),
            HASH160 | CURRENCY => FieldValue::Fixed(self.read_bytes(20)?.to_vec()),
            HASH192 => FieldValue::Fixed(self.read_bytes(24)?.to_vec()),
            HASH256 => FieldValue::Fixed(self.read_bytes(32)?.to_vec()),
            NUMBER | UINT96 => FieldValue::Fixed(self.read_bytes(12)?.to_vec()),
            UINT384 => FieldValue::Fixed(self.read_bytes(48)?.to_vec()),
            UINT512 => FieldValue::Fixed(self.read_bytes(64)?.to_vec()),
            AMOUNT => FieldValue::Amount(self.read_amount()?),
            BLOB => FieldValue::Blob(self.read_vl()?.to_vec()),
            ACCOUNT_ID => FieldValue::AccountId(self.read_account_id()?),
            OBJECT => FieldValue::Object(self.read_fields_until(fields::OBJECT_END)?),
            ARRAY => FieldValue::Array(self.read_fields_until(fields::ARRAY_END)?),
            VECTOR256 => {
                let bytes = self.read_vl()?;
                if bytes.len() % 32 != 0 {
                    return Err(CodecError::InvalidVectorLength(bytes.len()));
                }
                FieldValue::Vector256(
                    bytes
                        .chunks_exact(32)
                        .map(|chunk| {
                            let mut hash = [0u8; 32];
                            hash.copy_from_slice(chunk);
                            hash
                        })
                        .collect(),
                )
            }
            PATH_SET => FieldValue::PathSet(self.read_path_set()?),
            ISSUE => FieldValue::Issue(self.read_issue()?),
            XCHAIN_BRIDGE => {
                let start = self.pos;
                self.read_vl()?;
                self.read_issue()?;
                self.read_vl()?;
                self.read_issue()?;
                FieldValue::XChainBridge(self.data[start..self.pos].to_vec())
            }
            type_code => return Err(CodecError::UnsupportedType { type_code, offset }),
        };

        Ok(value)
    }
}

/// Read only the entry type of a serialized ledger entry
pub fn peek_entry_type(data: &[u8]) -> Result<u16, CodecError> {
    let mut parser = BinaryParser::new(data);
    if parser.read_field_id()? != fields::LEDGER_ENTRY_TYPE {
        return Err(CodecError::MissingEntryType);
    }
    Ok(u16::from_be_bytes(parser.read_array()?))
}

/// Decode every field of a serialized ledger entry
pub fn decode_fields(data: &[u8]) -> Result<Vec<(FieldId, FieldValue)>, CodecError> {
    let mut parser = BinaryParser::new(data);
    let mut fields = Vec::new();

    while !parser.is_end() {
        let id = parser.read_field_id()?;
        let value = parser.read_field_value(id)?;
        fields.push((id, value));
    }

    Ok(fields)
}

pub fn decode_hex(data: &str) -> Result<Vec<u8>, CodecError> {
    hex::decode(data).map_err(|e| CodecError::Hex(e.to_string()))
}

/// Classic `r...` address of a 20 byte account id
pub fn encode_account_id(account_id: &[u8; 20]) -> String {
    bs58::encode(account_id)
        .with_alphabet(bs58::Alphabet::RIPPLE)
        .with_check_version(0)
        .into_string()
}

/// Builders for serialized entries used by tests across the crate
#[cfg(test)]
pub(crate) mod test_support {
    pub const ACCOUNT_ROOT: u16 = 0x0061;
    pub const ESCROW: u16 = 0x0075;
    pub const OFFER: u16 = 0x006F;

    pub fn account(seed: u8) -> [u8; 20] {
        [seed; 20]
    }

    pub fn native(drops: u64) -> [u8; 8] {
        (drops | 0x4000_0000_0000_0000).to_be_bytes()
    }

    fn vl(out: &mut Vec<u8>, bytes: &[u8]) {
        assert!(bytes.len() <= 192);
        out.push(bytes.len() as u8);
        out.extend_from_slice(bytes);
    }

    fn entry_type(out: &mut Vec<u8>, code: u16) {
        out.push(0x11);
        out.extend_from_slice(&code.to_be_bytes());
    }

    pub fn account_root(account: [u8; 20], balance: u64, message_key: Option<&[u8]>) -> Vec<u8> {
        let mut out = Vec::new();
        entry_type(&mut out, ACCOUNT_ROOT);
        out.push(0x22); // Flags
        out.extend_from_slice(&0u32.to_be_bytes());
        out.push(0x24); // Sequence
        out.extend_from_slice(&7u32.to_be_bytes());
        out.push(0x25); // PreviousTxnLgrSeq
        out.extend_from_slice(&1234u32.to_be_bytes());
        out.push(0x2D); // OwnerCount
        out.extend_from_slice(&0u32.to_be_bytes());
        out.push(0x55); // PreviousTxnID
        out.extend_from_slice(&[0xAB; 32]);
        out.push(0x62); // Balance
        out.extend_from_slice(&native(balance));
        if let Some(key) = message_key {
            out.push(0x72); // MessageKey
            vl(&mut out, key);
        }
        out.push(0x81); // Account
        vl(&mut out, &account);
        out
    }

    pub fn escrow(account: [u8; 20], destination: [u8; 20], amount: u64) -> Vec<u8> {
        let mut out = Vec::new();
        entry_type(&mut out, ESCROW);
        out.push(0x22); // Flags
        out.extend_from_slice(&0u32.to_be_bytes());
        out.push(0x25); // PreviousTxnLgrSeq
        out.extend_from_slice(&1234u32.to_be_bytes());
        out.extend_from_slice(&[0x20, 0x25]); // FinishAfter
        out.extend_from_slice(&700_000_000u32.to_be_bytes());
        out.push(0x34); // OwnerNode
        out.extend_from_slice(&0u64.to_be_bytes());
        out.push(0x55); // PreviousTxnID
        out.extend_from_slice(&[0xCD; 32]);
        out.push(0x61); // Amount
        out.extend_from_slice(&native(amount));
        out.push(0x81); // Account
        vl(&mut out, &account);
        out.push(0x83); // Destination
        vl(&mut out, &destination);
        out
    }

    pub fn offer(account: [u8; 20]) -> Vec<u8> {
        let mut out = Vec::new();
        entry_type(&mut out, OFFER);
        out.push(0x22); // Flags
        out.extend_from_slice(&0u32.to_be_bytes());
        out.push(0x64); // TakerPays, issued currency
        out.push(0xD4);
        out.extend_from_slice(&[0x11; 47]);
        out.push(0x65); // TakerGets
        out.extend_from_slice(&native(25_000_000));
        out.push(0x81); // Account
        vl(&mut out, &account);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_encode_account_id() {
        assert_eq!(encode_account_id(&[0u8; 20]), "rrrrrrrrrrrrrrrrrrrrrhoLvTp");

        let genesis: [u8; 20] = hex::decode("B5F762798A53D543A014CAF8B297CFF8F2F937E8")
            .unwrap()
            .try_into()
            .unwrap();
        assert_eq!(encode_account_id(&genesis), "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh");
    }

    #[test]
    fn test_field_headers() {
        let mut parser = BinaryParser::new(&[0x11, 0x20, 0x25, 0x01, 0x10, 0x00, 0x13, 0x02]);
        assert_eq!(parser.read_field_id().unwrap(), FieldId::new(1, 1));
        assert_eq!(parser.read_field_id().unwrap(), FieldId::new(2, 37));
        assert_eq!(parser.read_field_id().unwrap(), FieldId::new(16, 1));
        assert_eq!(parser.read_field_id().unwrap(), FieldId::new(19, 2));
        assert!(parser.is_end());
    }

    #[test]
    fn test_variable_lengths() {
        let mut parser = BinaryParser::new(&[0xC0]);
        assert_eq!(parser.read_vl_length().unwrap(), 192);

        let mut parser = BinaryParser::new(&[0xC1, 0x00]);
        assert_eq!(parser.read_vl_length().unwrap(), 193);

        let mut parser = BinaryParser::new(&[0xF0, 0xFF]);
        assert_eq!(parser.read_vl_length().unwrap(), 12480);

        let mut parser = BinaryParser::new(&[0xF1, 0x00, 0x00]);
        assert_eq!(parser.read_vl_length().unwrap(), 12481);

        let mut parser = BinaryParser::new(&[0xFF]);
        assert!(matches!(
            parser.read_vl_length(),
            Err(CodecError::InvalidLength { prefix: 0xFF, offset: 0 })
        ));
    }

    #[test]
    fn test_peek_entry_type() {
        assert_eq!(peek_entry_type(&account_root(account(1), 10, None)).unwrap(), ACCOUNT_ROOT);
        assert_eq!(peek_entry_type(&escrow(account(1), account(2), 10)).unwrap(), ESCROW);
        assert_eq!(peek_entry_type(&[0x22, 0, 0, 0, 0]), Err(CodecError::MissingEntryType));
    }

    #[test]
    fn test_decode_account_root() {
        let data = account_root(account(3), 100_000_000, Some(&[0x02, 0xAA][..]));
        let decoded = decode_fields(&data).unwrap();

        let balance = decoded.iter().find(|(id, _)| *id == fields::BALANCE).unwrap();
        assert_eq!(
            balance.1,
            FieldValue::Amount(Amount::Native { drops: 100_000_000, positive: true })
        );

        let key = decoded.iter().find(|(id, _)| *id == fields::MESSAGE_KEY).unwrap();
        assert_eq!(key.1, FieldValue::Blob(vec![0x02, 0xAA]));

        let owner = decoded.iter().find(|(id, _)| *id == fields::ACCOUNT).unwrap();
        assert_eq!(owner.1, FieldValue::AccountId(account(3)));
    }

    #[test]
    fn test_decode_issued_amounts() {
        let decoded = decode_fields(&offer(account(4))).unwrap();
        let taker_pays = decoded.iter().find(|(id, _)| *id == FieldId::new(6, 4)).unwrap();
        assert!(matches!(taker_pays.1, FieldValue::Amount(Amount::Issued(ref raw)) if raw.len() == 48));
    }

    #[test]
    fn test_truncated_data() {
        let mut data = account_root(account(5), 1, None);
        data.truncate(data.len() - 3);
        assert!(matches!(decode_fields(&data), Err(CodecError::UnexpectedEnd(_))));
    }

    #[test]
    fn test_unsupported_type() {
        // type code 30 does not exist
        let data = [0x11, 0x00, 0x61, 0x01, 0x1E, 0x00];
        assert!(matches!(
            decode_fields(&data),
            Err(CodecError::UnsupportedType { type_code: 30, .. })
        ));
    }
}
