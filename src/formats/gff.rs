use crate::error::{ExtractError, Result};

const HEADER_LEN: usize = 56;
const STRUCT_ENTRY_LEN: usize = 12;
const FIELD_ENTRY_LEN: usize = 12;
const LABEL_LEN: usize = 16;

pub const TYPE_BYTE: u32 = 0;
pub const TYPE_CHAR: u32 = 1;
pub const TYPE_WORD: u32 = 2;
pub const TYPE_SHORT: u32 = 3;
pub const TYPE_DWORD: u32 = 4;
pub const TYPE_INT: u32 = 5;
pub const TYPE_DWORD64: u32 = 6;
pub const TYPE_INT64: u32 = 7;
pub const TYPE_FLOAT: u32 = 8;
pub const TYPE_DOUBLE: u32 = 9;
pub const TYPE_CEXOSTRING: u32 = 10;
pub const TYPE_RESREF: u32 = 11;
pub const TYPE_CEXOLOCSTRING: u32 = 12;
pub const TYPE_VOID: u32 = 13;
pub const TYPE_STRUCT: u32 = 14;
pub const TYPE_LIST: u32 = 15;

struct RawStruct {
    _struct_type: u32,
    data_or_offset: u32,
    field_count: u32,
}

struct RawField {
    field_type: u32,
    label_index: u32,
    data_or_offset: u32,
}

/// One language-tagged substring of a localized string field.
#[derive(Debug, Clone)]
pub struct LocSubstring {
    pub language_id: u32,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct LocString {
    pub string_ref: u32,
    pub substrings: Vec<LocSubstring>,
}

impl LocString {
    /// The display text: the first substring, or empty when none are stored.
    pub fn first_text(&self) -> &str {
        self.substrings.first().map(|s| s.text.as_str()).unwrap_or("")
    }
}

/// A decoded field. Scalar types 0-5 and FLOAT are stored inline in the
/// field entry; the rest live in the field data block.
pub enum FieldValue<'a> {
    Byte(u8),
    Char(i8),
    Word(u16),
    Short(i16),
    Dword(u32),
    Int(i32),
    Dword64(u64),
    Int64(i64),
    Float(f32),
    Double(f64),
    String(String),
    ResRef(String),
    LocString(LocString),
    Void(Vec<u8>),
    Struct(GffStruct<'a>),
    List(Vec<GffStruct<'a>>),
}

impl FieldValue<'_> {
    fn type_id(&self) -> u32 {
        match self {
            FieldValue::Byte(_) => TYPE_BYTE,
            FieldValue::Char(_) => TYPE_CHAR,
            FieldValue::Word(_) => TYPE_WORD,
            FieldValue::Short(_) => TYPE_SHORT,
            FieldValue::Dword(_) => TYPE_DWORD,
            FieldValue::Int(_) => TYPE_INT,
            FieldValue::Dword64(_) => TYPE_DWORD64,
            FieldValue::Int64(_) => TYPE_INT64,
            FieldValue::Float(_) => TYPE_FLOAT,
            FieldValue::Double(_) => TYPE_DOUBLE,
            FieldValue::String(_) => TYPE_CEXOSTRING,
            FieldValue::ResRef(_) => TYPE_RESREF,
            FieldValue::LocString(_) => TYPE_CEXOLOCSTRING,
            FieldValue::Void(_) => TYPE_VOID,
            FieldValue::Struct(_) => TYPE_STRUCT,
            FieldValue::List(_) => TYPE_LIST,
        }
    }
}

/// A parsed hierarchical record (GFF V3.2). The file is a set of flat
/// tables; structs and lists reference each other by index, so views into
/// the tree are cheap struct-index cursors.
pub struct GffFile {
    structs: Vec<RawStruct>,
    fields: Vec<RawField>,
    labels: Vec<String>,
    field_data: Vec<u8>,
    field_indices: Vec<u8>,
    list_indices: Vec<u8>,
}

impl GffFile {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(ExtractError::CorruptRecord(
                "file shorter than header".to_string(),
            ));
        }

        if &data[4..8] != b"V3.2" {
            return Err(ExtractError::CorruptRecord(format!(
                "unsupported version {:?}",
                &data[4..8]
            )));
        }

        let word = |i: usize| -> u32 {
            u32::from_le_bytes([data[8 + i * 4], data[9 + i * 4], data[10 + i * 4], data[11 + i * 4]])
        };

        let struct_offset = word(0) as usize;
        let struct_count = word(1) as usize;
        let field_offset = word(2) as usize;
        let field_count = word(3) as usize;
        let label_offset = word(4) as usize;
        let label_count = word(5) as usize;
        let field_data_offset = word(6) as usize;
        let field_data_count = word(7) as usize;
        let field_indices_offset = word(8) as usize;
        let field_indices_count = word(9) as usize;
        let list_indices_offset = word(10) as usize;
        let list_indices_count = word(11) as usize;

        fn region<'a>(data: &'a [u8], name: &str, offset: usize, len: usize) -> Result<&'a [u8]> {
            if offset + len > data.len() {
                return Err(ExtractError::CorruptRecord(format!(
                    "{} region {}+{} overruns file length {}",
                    name,
                    offset,
                    len,
                    data.len()
                )));
            }
            Ok(&data[offset..offset + len])
        }

        let struct_bytes = region(data, "struct", struct_offset, struct_count * STRUCT_ENTRY_LEN)?;
        let field_bytes = region(data, "field", field_offset, field_count * FIELD_ENTRY_LEN)?;
        let label_bytes = region(data, "label", label_offset, label_count * LABEL_LEN)?;
        let field_data = region(data, "field data", field_data_offset, field_data_count)?.to_vec();
        let field_indices =
            region(data, "field indices", field_indices_offset, field_indices_count)?.to_vec();
        let list_indices =
            region(data, "list indices", list_indices_offset, list_indices_count)?.to_vec();

        let structs = struct_bytes
            .chunks_exact(STRUCT_ENTRY_LEN)
            .map(|c| RawStruct {
                _struct_type: u32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                data_or_offset: u32::from_le_bytes([c[4], c[5], c[6], c[7]]),
                field_count: u32::from_le_bytes([c[8], c[9], c[10], c[11]]),
            })
            .collect::<Vec<_>>();

        let fields = field_bytes
            .chunks_exact(FIELD_ENTRY_LEN)
            .map(|c| RawField {
                field_type: u32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                label_index: u32::from_le_bytes([c[4], c[5], c[6], c[7]]),
                data_or_offset: u32::from_le_bytes([c[8], c[9], c[10], c[11]]),
            })
            .collect::<Vec<_>>();

        let labels = label_bytes
            .chunks_exact(LABEL_LEN)
            .map(|c| {
                let end = c.iter().position(|&b| b == 0).unwrap_or(LABEL_LEN);
                String::from_utf8_lossy(&c[..end]).to_string()
            })
            .collect::<Vec<_>>();

        if structs.is_empty() {
            return Err(ExtractError::CorruptRecord(
                "record has no top-level struct".to_string(),
            ));
        }

        Ok(GffFile {
            structs,
            fields,
            labels,
            field_data,
            field_indices,
            list_indices,
        })
    }

    pub fn root(&self) -> GffStruct<'_> {
        GffStruct { gff: self, index: 0 }
    }

    fn data_u32(&self, blob: &[u8], offset: usize, what: &str) -> Result<u32> {
        if offset + 4 > blob.len() {
            return Err(ExtractError::CorruptRecord(format!(
                "{} read at {} overruns block length {}",
                what,
                offset,
                blob.len()
            )));
        }
        Ok(u32::from_le_bytes([
            blob[offset],
            blob[offset + 1],
            blob[offset + 2],
            blob[offset + 3],
        ]))
    }

    fn data_run<'a>(&'a self, offset: usize, len: usize, what: &str) -> Result<&'a [u8]> {
        if offset + len > self.field_data.len() {
            return Err(ExtractError::CorruptRecord(format!(
                "{} run {}+{} overruns field data length {}",
                what,
                offset,
                len,
                self.field_data.len()
            )));
        }
        Ok(&self.field_data[offset..offset + len])
    }
}

/// A cursor over one struct in the record tree.
#[derive(Clone, Copy)]
pub struct GffStruct<'a> {
    gff: &'a GffFile,
    index: usize,
}

impl<'a> GffStruct<'a> {
    fn raw(&self) -> &'a RawStruct {
        &self.gff.structs[self.index]
    }

    /// Indices into the field table for every field of this struct. A
    /// one-field struct stores the field index inline; larger structs point
    /// into the field indices block.
    fn field_indices(&self) -> Result<Vec<usize>> {
        let raw = self.raw();
        match raw.field_count {
            0 => Ok(Vec::new()),
            1 => Ok(vec![raw.data_or_offset as usize]),
            n => {
                let base = raw.data_or_offset as usize;
                let mut out = Vec::with_capacity(n as usize);
                for i in 0..n as usize {
                    out.push(
                        self.gff
                            .data_u32(&self.gff.field_indices, base + i * 4, "field index")?
                            as usize,
                    );
                }
                Ok(out)
            }
        }
    }

    fn find_field(&self, label: &str) -> Result<Option<&'a RawField>> {
        for index in self.field_indices()? {
            let field = self.gff.fields.get(index).ok_or_else(|| {
                ExtractError::CorruptRecord(format!(
                    "field index {} out of range ({} fields)",
                    index,
                    self.gff.fields.len()
                ))
            })?;
            let name = self
                .gff
                .labels
                .get(field.label_index as usize)
                .ok_or_else(|| {
                    ExtractError::CorruptRecord(format!(
                        "label index {} out of range ({} labels)",
                        field.label_index,
                        self.gff.labels.len()
                    ))
                })?;
            if name == label {
                return Ok(Some(field));
            }
        }
        Ok(None)
    }

    /// Decode the named field. Fails with `FieldNotFound` when absent.
    pub fn field(&self, label: &str) -> Result<FieldValue<'a>> {
        let field = self
            .find_field(label)?
            .ok_or_else(|| ExtractError::FieldNotFound(label.to_string()))?;
        self.decode(field, label)
    }

    fn decode(&self, field: &RawField, label: &str) -> Result<FieldValue<'a>> {
        let gff = self.gff;
        let data = field.data_or_offset;
        let offset = data as usize;

        let value = match field.field_type {
            TYPE_BYTE => FieldValue::Byte(data as u8),
            TYPE_CHAR => FieldValue::Char(data as u8 as i8),
            TYPE_WORD => FieldValue::Word(data as u16),
            TYPE_SHORT => FieldValue::Short(data as u16 as i16),
            TYPE_DWORD => FieldValue::Dword(data),
            TYPE_INT => FieldValue::Int(data as i32),
            TYPE_FLOAT => FieldValue::Float(f32::from_bits(data)),
            TYPE_DWORD64 => {
                let run = gff.data_run(offset, 8, "DWORD64")?;
                FieldValue::Dword64(u64::from_le_bytes(run.try_into().unwrap()))
            }
            TYPE_INT64 => {
                let run = gff.data_run(offset, 8, "INT64")?;
                FieldValue::Int64(i64::from_le_bytes(run.try_into().unwrap()))
            }
            TYPE_DOUBLE => {
                let run = gff.data_run(offset, 8, "DOUBLE")?;
                FieldValue::Double(f64::from_le_bytes(run.try_into().unwrap()))
            }
            TYPE_CEXOSTRING => {
                let len = gff.data_u32(&gff.field_data, offset, "string length")? as usize;
                let run = gff.data_run(offset + 4, len, "string")?;
                FieldValue::String(String::from_utf8_lossy(run).to_string())
            }
            TYPE_RESREF => {
                let len = gff.data_run(offset, 1, "resref length")?[0] as usize;
                let run = gff.data_run(offset + 1, len, "resref")?;
                FieldValue::ResRef(String::from_utf8_lossy(run).to_string())
            }
            TYPE_CEXOLOCSTRING => {
                let string_ref = gff.data_u32(&gff.field_data, offset + 4, "string ref")?;
                let count = gff.data_u32(&gff.field_data, offset + 8, "substring count")?;
                let mut pos = offset + 12;
                let mut substrings = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let language_id = gff.data_u32(&gff.field_data, pos, "language id")?;
                    let len = gff.data_u32(&gff.field_data, pos + 4, "substring length")? as usize;
                    let run = gff.data_run(pos + 8, len, "substring")?;
                    substrings.push(LocSubstring {
                        language_id,
                        text: String::from_utf8_lossy(run).to_string(),
                    });
                    pos += 8 + len;
                }
                FieldValue::LocString(LocString {
                    string_ref,
                    substrings,
                })
            }
            TYPE_VOID => {
                let len = gff.data_u32(&gff.field_data, offset, "void length")? as usize;
                FieldValue::Void(gff.data_run(offset + 4, len, "void")?.to_vec())
            }
            TYPE_STRUCT => {
                if offset >= gff.structs.len() {
                    return Err(ExtractError::CorruptRecord(format!(
                        "struct index {} out of range ({} structs)",
                        offset,
                        gff.structs.len()
                    )));
                }
                FieldValue::Struct(GffStruct { gff, index: offset })
            }
            TYPE_LIST => {
                let count = gff.data_u32(&gff.list_indices, offset, "list count")?;
                let mut structs = Vec::with_capacity(count as usize);
                for i in 0..count as usize {
                    let index =
                        gff.data_u32(&gff.list_indices, offset + 4 + i * 4, "list entry")? as usize;
                    if index >= gff.structs.len() {
                        return Err(ExtractError::CorruptRecord(format!(
                            "list entry {} out of range ({} structs)",
                            index,
                            gff.structs.len()
                        )));
                    }
                    structs.push(GffStruct { gff, index });
                }
                FieldValue::List(structs)
            }
            other => {
                return Err(ExtractError::CorruptRecord(format!(
                    "field {} has unknown type {}",
                    label, other
                )))
            }
        };

        Ok(value)
    }

    fn expect(&self, label: &str, expected: &'static str, found: FieldValue<'a>) -> ExtractError {
        ExtractError::FieldTypeMismatch {
            label: label.to_string(),
            expected,
            found: found.type_id(),
        }
    }

    pub fn get_u8(&self, label: &str) -> Result<u8> {
        match self.field(label)? {
            FieldValue::Byte(v) => Ok(v),
            other => Err(self.expect(label, "BYTE", other)),
        }
    }

    pub fn get_i32(&self, label: &str) -> Result<i32> {
        match self.field(label)? {
            FieldValue::Int(v) => Ok(v),
            other => Err(self.expect(label, "INT", other)),
        }
    }

    pub fn get_f32(&self, label: &str) -> Result<f32> {
        match self.field(label)? {
            FieldValue::Float(v) => Ok(v),
            other => Err(self.expect(label, "FLOAT", other)),
        }
    }

    pub fn get_string(&self, label: &str) -> Result<String> {
        match self.field(label)? {
            FieldValue::String(v) => Ok(v),
            other => Err(self.expect(label, "CEXOSTRING", other)),
        }
    }

    pub fn get_resref(&self, label: &str) -> Result<String> {
        match self.field(label)? {
            FieldValue::ResRef(v) => Ok(v),
            other => Err(self.expect(label, "RESREF", other)),
        }
    }

    pub fn get_loc_string(&self, label: &str) -> Result<LocString> {
        match self.field(label)? {
            FieldValue::LocString(v) => Ok(v),
            other => Err(self.expect(label, "CEXOLOCSTRING", other)),
        }
    }

    pub fn get_struct(&self, label: &str) -> Result<GffStruct<'a>> {
        match self.field(label)? {
            FieldValue::Struct(v) => Ok(v),
            other => Err(self.expect(label, "STRUCT", other)),
        }
    }

    pub fn get_list(&self, label: &str) -> Result<Vec<GffStruct<'a>>> {
        match self.field(label)? {
            FieldValue::List(v) => Ok(v),
            other => Err(self.expect(label, "LIST", other)),
        }
    }
}

/// Treat an absent optional field as "no value"; every other failure stands.
pub fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(ExtractError::FieldNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
pub(crate) mod test_bytes {
    //! Assembles well-formed record bytes for fixtures. Mirrors the on-disk
    //! layout: flat struct/field/label tables plus the three data blocks.

    pub enum Val {
        Byte(u8),
        Int(i32),
        Float(f32),
        Str(String),
        ResRef(String),
        Loc(Vec<(u32, String)>),
        Struct(Vec<(String, Val)>),
        List(Vec<Vec<(String, Val)>>),
    }

    #[derive(Default)]
    struct Builder {
        structs: Vec<(u32, u32, u32)>, // type, data_or_offset, field_count
        fields: Vec<(u32, u32, u32)>,  // type, label_index, data_or_offset
        labels: Vec<String>,
        field_data: Vec<u8>,
        field_indices: Vec<u8>,
        list_indices: Vec<u8>,
    }

    impl Builder {
        fn label_index(&mut self, label: &str) -> u32 {
            if let Some(i) = self.labels.iter().position(|l| l == label) {
                return i as u32;
            }
            self.labels.push(label.to_string());
            self.labels.len() as u32 - 1
        }

        fn add_struct(&mut self, members: &[(String, Val)]) -> u32 {
            let struct_index = self.structs.len() as u32;
            self.structs.push((0, 0, members.len() as u32));

            let mut field_indices = Vec::new();
            for (label, val) in members {
                let label_index = self.label_index(label);
                let (field_type, data) = self.encode(val);
                field_indices.push(self.fields.len() as u32);
                self.fields.push((field_type, label_index, data));
            }

            let data_or_offset = match field_indices.len() {
                0 => 0,
                1 => field_indices[0],
                _ => {
                    let offset = self.field_indices.len() as u32;
                    for index in &field_indices {
                        self.field_indices.extend_from_slice(&index.to_le_bytes());
                    }
                    offset
                }
            };
            self.structs[struct_index as usize].1 = data_or_offset;
            struct_index
        }

        fn encode(&mut self, val: &Val) -> (u32, u32) {
            match val {
                Val::Byte(v) => (super::TYPE_BYTE, *v as u32),
                Val::Int(v) => (super::TYPE_INT, *v as u32),
                Val::Float(v) => (super::TYPE_FLOAT, v.to_bits()),
                Val::Str(s) => {
                    let offset = self.field_data.len() as u32;
                    self.field_data
                        .extend_from_slice(&(s.len() as u32).to_le_bytes());
                    self.field_data.extend_from_slice(s.as_bytes());
                    (super::TYPE_CEXOSTRING, offset)
                }
                Val::ResRef(s) => {
                    let offset = self.field_data.len() as u32;
                    self.field_data.push(s.len() as u8);
                    self.field_data.extend_from_slice(s.as_bytes());
                    (super::TYPE_RESREF, offset)
                }
                Val::Loc(substrings) => {
                    let offset = self.field_data.len() as u32;
                    let total: u32 = 8 + substrings.iter().map(|(_, s)| 8 + s.len() as u32).sum::<u32>();
                    self.field_data.extend_from_slice(&total.to_le_bytes());
                    self.field_data.extend_from_slice(&u32::MAX.to_le_bytes());
                    self.field_data
                        .extend_from_slice(&(substrings.len() as u32).to_le_bytes());
                    for (language_id, text) in substrings {
                        self.field_data.extend_from_slice(&language_id.to_le_bytes());
                        self.field_data
                            .extend_from_slice(&(text.len() as u32).to_le_bytes());
                        self.field_data.extend_from_slice(text.as_bytes());
                    }
                    (super::TYPE_CEXOLOCSTRING, offset)
                }
                Val::Struct(members) => {
                    let index = self.add_struct(members);
                    (super::TYPE_STRUCT, index)
                }
                Val::List(entries) => {
                    let indices: Vec<u32> =
                        entries.iter().map(|members| self.add_struct(members)).collect();
                    let offset = self.list_indices.len() as u32;
                    self.list_indices
                        .extend_from_slice(&(indices.len() as u32).to_le_bytes());
                    for index in indices {
                        self.list_indices.extend_from_slice(&index.to_le_bytes());
                    }
                    (super::TYPE_LIST, offset)
                }
            }
        }
    }

    pub fn build_gff(file_type: &[u8; 4], root: Vec<(String, Val)>) -> Vec<u8> {
        let mut builder = Builder::default();
        builder.add_struct(&root);

        let struct_bytes: Vec<u8> = builder
            .structs
            .iter()
            .flat_map(|&(a, b, c)| {
                [a.to_le_bytes(), b.to_le_bytes(), c.to_le_bytes()].concat()
            })
            .collect();
        let field_bytes: Vec<u8> = builder
            .fields
            .iter()
            .flat_map(|&(a, b, c)| {
                [a.to_le_bytes(), b.to_le_bytes(), c.to_le_bytes()].concat()
            })
            .collect();
        let mut label_bytes = Vec::new();
        for label in &builder.labels {
            let mut padded = [0u8; 16];
            padded[..label.len()].copy_from_slice(label.as_bytes());
            label_bytes.extend_from_slice(&padded);
        }

        let mut out = Vec::new();
        out.extend_from_slice(file_type);
        out.extend_from_slice(b"V3.2");

        let mut offset = 56u32;
        let mut header = Vec::new();
        for (bytes, count) in [
            (&struct_bytes, builder.structs.len() as u32),
            (&field_bytes, builder.fields.len() as u32),
            (&label_bytes, builder.labels.len() as u32),
            (&builder.field_data, builder.field_data.len() as u32),
            (&builder.field_indices, builder.field_indices.len() as u32),
            (&builder.list_indices, builder.list_indices.len() as u32),
        ] {
            header.extend_from_slice(&offset.to_le_bytes());
            header.extend_from_slice(&count.to_le_bytes());
            offset += bytes.len() as u32;
        }
        out.extend_from_slice(&header);
        out.extend_from_slice(&struct_bytes);
        out.extend_from_slice(&field_bytes);
        out.extend_from_slice(&label_bytes);
        out.extend_from_slice(&builder.field_data);
        out.extend_from_slice(&builder.field_indices);
        out.extend_from_slice(&builder.list_indices);
        out
    }
}
