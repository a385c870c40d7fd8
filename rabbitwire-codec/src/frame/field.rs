use bytes::Bytes;

/// Decimal value as it travels on the wire: `value / 10^scale`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Decimal {
    pub scale: u8,
    pub value: u32,
}

/// Typed value of a field table or a field array.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    /// Long string, must be valid UTF-8.
    String(String),
    /// Raw byte array.
    Bytes(Bytes),
    Array(Vec<FieldValue>),
    Table(FieldTable),
    /// Seconds since the epoch.
    Timestamp(u64),
    Void,
}

impl FieldValue {
    /// The one-byte type tag of the value on the wire.
    pub fn tag(&self) -> u8 {
        match self {
            FieldValue::Bool(_) => b't',
            FieldValue::I8(_) => b'b',
            FieldValue::U8(_) => b'B',
            FieldValue::I16(_) => b's',
            FieldValue::U16(_) => b'u',
            FieldValue::I32(_) => b'I',
            FieldValue::U32(_) => b'i',
            FieldValue::I64(_) => b'l',
            FieldValue::U64(_) => b'L',
            FieldValue::F32(_) => b'f',
            FieldValue::F64(_) => b'd',
            FieldValue::Decimal(_) => b'D',
            FieldValue::String(_) => b'S',
            FieldValue::Bytes(_) => b'x',
            FieldValue::Array(_) => b'A',
            FieldValue::Table(_) => b'F',
            FieldValue::Timestamp(_) => b'T',
            FieldValue::Void => b'V',
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&FieldTable> {
        match self {
            FieldValue::Table(t) => Some(t),
            _ => None,
        }
    }
}

macro_rules! field_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::$variant(value)
                }
            }
        )*
    };
}

field_value_from! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Decimal => Decimal,
    String => String,
    Bytes => Bytes,
    Vec<FieldValue> => Array,
    FieldTable => Table,
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

/// One named value of a field table.
#[derive(Clone, Debug, PartialEq)]
pub struct TableEntry {
    pub key: String,
    pub value: FieldValue,
}

impl TableEntry {
    pub fn new(key: &str, value: impl Into<FieldValue>) -> Self {
        Self {
            key: key.to_string(),
            value: value.into(),
        }
    }
}

/// Ordered list of table entries.
///
/// The protocol doesn't require unique keys, so duplicates are kept and encoded
/// in insertion order. Lookups return the first match.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldTable {
    entries: Vec<TableEntry>,
}

impl FieldTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<FieldValue>) -> &mut Self {
        self.entries.push(TableEntry::new(key, value));
        self
    }

    pub fn with(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn push(&mut self, entry: TableEntry) {
        self.entries.push(entry);
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries.iter().find(|e| e.key == key).map(|e| &e.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TableEntry> {
        self.entries.iter()
    }

    /// Appends the entries of `other` which are not present by key in `self`.
    pub fn merge_missing(&mut self, other: &FieldTable) {
        for entry in other.iter() {
            if self.get(&entry.key).is_none() {
                self.entries.push(entry.clone());
            }
        }
    }
}

impl From<Vec<TableEntry>> for FieldTable {
    fn from(entries: Vec<TableEntry>) -> Self {
        Self { entries }
    }
}

impl<const N: usize> From<[TableEntry; N]> for FieldTable {
    fn from(entries: [TableEntry; N]) -> Self {
        Self {
            entries: entries.into(),
        }
    }
}

impl FromIterator<TableEntry> for FieldTable {
    fn from_iter<I: IntoIterator<Item = TableEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Extend<TableEntry> for FieldTable {
    fn extend<I: IntoIterator<Item = TableEntry>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

impl IntoIterator for FieldTable {
    type Item = TableEntry;
    type IntoIter = std::vec::IntoIter<TableEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a FieldTable {
    type Item = &'a TableEntry;
    type IntoIter = std::slice::Iter<'a, TableEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
