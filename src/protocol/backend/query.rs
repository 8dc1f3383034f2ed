//! Result-bearing backend messages.

use zerocopy::byteorder::big_endian::U16 as U16BE;
use zerocopy::FromBytes;

use crate::error::{Error, Result};
use crate::protocol::codec::{read_cstr, read_i16, read_i32, read_nullable_bytes, read_u32};
use crate::protocol::types::{FormatCode, Oid};

/// Metadata for one result column, owned by the result set.
#[derive(Debug, Clone)]
pub struct Column {
    /// Column name chosen by the server
    pub name: String,
    /// OID of the source table, 0 when not a plain table column
    pub table_oid: Oid,
    /// Attribute number within the source table, 0 when not applicable
    pub column_id: i16,
    /// OID of the field's data type
    pub type_oid: Oid,
    /// Type size; negative for variable-width types
    pub type_size: i16,
    /// Type-specific modifier (e.g. varchar length)
    pub type_modifier: i32,
    /// Wire format the field values arrive in
    pub format: FormatCode,
}

/// RowDescription: the column layout of the rows that follow.
#[derive(Debug)]
pub struct RowDescription {
    columns: Vec<Column>,
}

impl RowDescription {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let (count, mut data) = U16BE::read_from_prefix(payload)
            .map_err(|_| Error::Protocol("RowDescription: missing field count".into()))?;

        let count = count.get() as usize;
        let mut columns = Vec::with_capacity(count);
        for _ in 0..count {
            let (name, rest) = read_cstr(data)?;
            let (table_oid, rest) = read_u32(rest)?;
            let (column_id, rest) = read_i16(rest)?;
            let (type_oid, rest) = read_u32(rest)?;
            let (type_size, rest) = read_i16(rest)?;
            let (type_modifier, rest) = read_i32(rest)?;
            let (format, rest) = read_i16(rest)?;

            columns.push(Column {
                name: name.to_string(),
                table_oid,
                column_id,
                type_oid,
                type_size,
                type_modifier,
                format: FormatCode::from_i16(format),
            });
            data = rest;
        }

        Ok(Self { columns })
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

/// DataRow: one row of field values; NULL fields have length -1.
#[derive(Debug, Clone, Copy)]
pub struct DataRow<'a> {
    field_count: u16,
    fields_data: &'a [u8],
}

impl<'a> DataRow<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (count, rest) = U16BE::read_from_prefix(payload)
            .map_err(|_| Error::Protocol("DataRow: missing field count".into()))?;
        Ok(Self {
            field_count: count.get(),
            fields_data: rest,
        })
    }

    pub fn len(&self) -> usize {
        self.field_count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.field_count == 0
    }

    /// Iterate field values in order; `None` is a NULL field.
    pub fn iter(&self) -> DataRowIter<'a> {
        DataRowIter {
            remaining: self.fields_data,
            fields_left: self.field_count,
        }
    }

    /// The value of one field, or `None` past the end of the row.
    pub fn get(&self, index: usize) -> Option<Option<&'a [u8]>> {
        self.iter().nth(index)
    }
}

/// Iterator over the fields of a [`DataRow`].
#[derive(Debug, Clone)]
pub struct DataRowIter<'a> {
    remaining: &'a [u8],
    fields_left: u16,
}

impl<'a> Iterator for DataRowIter<'a> {
    type Item = Option<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fields_left == 0 {
            return None;
        }
        self.fields_left -= 1;
        match read_nullable_bytes(self.remaining) {
            Ok((value, rest)) => {
                self.remaining = rest;
                Some(value)
            }
            Err(_) => None,
        }
    }
}

/// CommandComplete: a statement finished; the tag reports what it did.
#[derive(Debug, Clone, Copy)]
pub struct CommandComplete<'a> {
    /// Command tag, e.g. `"SELECT 5"`, `"INSERT 0 1"`, `"BEGIN"`
    pub tag: &'a str,
}

impl<'a> CommandComplete<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<Self> {
        let (tag, _) = read_cstr(payload)?;
        Ok(Self { tag })
    }

    /// Rows affected: the trailing integer of the tag, 0 when absent.
    ///
    /// Covers `SELECT n`, `UPDATE n`, `DELETE n` and the three-part
    /// `INSERT oid n` alike.
    pub fn rows_affected(&self) -> u64 {
        self.tag
            .rsplit(' ')
            .next()
            .and_then(|last| last.parse().ok())
            .unwrap_or(0)
    }
}

/// EmptyQueryResponse: the query string was empty.
#[derive(Debug, Clone, Copy)]
pub struct EmptyQueryResponse;

impl EmptyQueryResponse {
    pub fn parse(_payload: &[u8]) -> Result<Self> {
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_description_payload() -> Vec<u8> {
        let mut payload = 2_u16.to_be_bytes().to_vec();
        for (name, type_oid) in [("id", 23_u32), ("label", 25_u32)] {
            payload.extend_from_slice(name.as_bytes());
            payload.push(0);
            payload.extend_from_slice(&0_u32.to_be_bytes()); // table oid
            payload.extend_from_slice(&0_i16.to_be_bytes()); // column id
            payload.extend_from_slice(&type_oid.to_be_bytes());
            payload.extend_from_slice(&(-1_i16).to_be_bytes()); // type size
            payload.extend_from_slice(&(-1_i32).to_be_bytes()); // type modifier
            payload.extend_from_slice(&0_i16.to_be_bytes()); // format
        }
        payload
    }

    #[test]
    fn row_description_fields() {
        let desc = RowDescription::parse(&row_description_payload()).unwrap();
        let columns = desc.columns();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].name, "id");
        assert_eq!(columns[0].type_oid, 23);
        assert_eq!(columns[1].name, "label");
        assert_eq!(columns[1].format, FormatCode::Text);
    }

    #[test]
    fn data_row_iteration_with_null() {
        let mut payload = 3_u16.to_be_bytes().to_vec();
        payload.extend_from_slice(&2_i32.to_be_bytes());
        payload.extend_from_slice(b"42");
        payload.extend_from_slice(&(-1_i32).to_be_bytes());
        payload.extend_from_slice(&0_i32.to_be_bytes());

        let row = DataRow::parse(&payload).unwrap();
        assert_eq!(row.len(), 3);
        let values: Vec<_> = row.iter().collect();
        assert_eq!(values, vec![Some(&b"42"[..]), None, Some(&b""[..])]);
        assert_eq!(row.get(1), Some(None));
        assert_eq!(row.get(3), None);
    }

    #[test]
    fn command_tag_row_counts() {
        for (tag, expected) in [
            ("SELECT 5", 5),
            ("INSERT 0 1", 1),
            ("UPDATE 10", 10),
            ("DELETE 3", 3),
            ("BEGIN", 0),
            ("CREATE TABLE", 0),
            ("SET", 0),
        ] {
            let mut payload = tag.as_bytes().to_vec();
            payload.push(0);
            let complete = CommandComplete::parse(&payload).unwrap();
            assert_eq!(complete.rows_affected(), expected, "tag {tag:?}");
        }
    }
}
