use rust_decimal::Decimal;
use crate::storage::models::MinifiedRecord;
use crate::xrpl::codec::{self, fields, Amount, CodecError, FieldId, FieldValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEntryType {
    AccountRoot,
    Escrow,
    Other(u16),
}

impl From<u16> for LedgerEntryType {
    fn from(code: u16) -> Self {
        match code {
            0x0061 => LedgerEntryType::AccountRoot,
            0x0075 => LedgerEntryType::Escrow,
            other => LedgerEntryType::Other(other),
        }
    }
}

impl LedgerEntryType {
    /// Entry types that carry XRP owned by an account
    pub fn is_relevant(&self) -> bool {
        matches!(self, LedgerEntryType::AccountRoot | LedgerEntryType::Escrow)
    }
}

/// A decoded ledger state entry
#[derive(Debug, Clone)]
pub struct RawLedgerObject {
    pub index: String,
    pub entry_type: LedgerEntryType,
    fields: Vec<(FieldId, FieldValue)>,
}

impl RawLedgerObject {
    pub fn decode(index: &str, data: &[u8]) -> Result<Self, CodecError> {
        let entry_type = LedgerEntryType::from(codec::peek_entry_type(data)?);
        Ok(Self {
            index: index.to_string(),
            entry_type,
            fields: codec::decode_fields(data)?,
        })
    }

    pub fn field(&self, id: FieldId) -> Option<&FieldValue> {
        self.fields.iter().find(|(field, _)| *field == id).map(|(_, value)| value)
    }

    fn account_field(&self, id: FieldId, name: &'static str) -> Result<String, CodecError> {
        match self.field(id) {
            Some(FieldValue::AccountId(account_id)) => Ok(codec::encode_account_id(account_id)),
            Some(_) => Err(CodecError::UnexpectedFieldType(name)),
            None => Err(CodecError::MissingField(name)),
        }
    }

    fn native_field(&self, id: FieldId, name: &'static str) -> Result<Decimal, CodecError> {
        match self.field(id) {
            Some(FieldValue::Amount(Amount::Native { drops, positive: true })) => Ok(Decimal::from(*drops)),
            Some(FieldValue::Amount(Amount::Native { drops: 0, .. })) => Ok(Decimal::ZERO),
            Some(FieldValue::Amount(_)) => Err(CodecError::NonNativeAmount(name)),
            Some(_) => Err(CodecError::UnexpectedFieldType(name)),
            None => Err(CodecError::MissingField(name)),
        }
    }

    fn message_key(&self) -> Result<Option<String>, CodecError> {
        match self.field(fields::MESSAGE_KEY) {
            Some(FieldValue::Blob(key)) => Ok(Some(hex::encode_upper(key))),
            Some(_) => Err(CodecError::UnexpectedFieldType("MessageKey")),
            None => Ok(None),
        }
    }

    /// Keep only the fields the snapshot needs
    pub fn minify(&self) -> Result<Option<MinifiedRecord>, CodecError> {
        let record = match self.entry_type {
            LedgerEntryType::AccountRoot => MinifiedRecord::Account {
                address: self.account_field(fields::ACCOUNT, "Account")?,
                balance: self.native_field(fields::BALANCE, "Balance")?,
                message_key: self.message_key()?,
            },
            LedgerEntryType::Escrow => MinifiedRecord::Escrow {
                index: self.index.clone(),
                destination: self.account_field(fields::DESTINATION, "Destination")?,
                amount: self.native_field(fields::AMOUNT, "Amount")?,
            },
            LedgerEntryType::Other(_) => return Ok(None),
        };
        Ok(Some(record))
    }
}
