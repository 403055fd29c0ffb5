use super::{check_bounds, check_field_type, MemoryLayout, Value};
use crate::buffer::TupleBuffer;
use crate::common::Schema;
use crate::error::Result;

/// Row-major layout: all fields of one record are contiguous. Favored for
/// point lookups and record-at-a-time operators (`SPEC_FULL.md` §4.11
/// memory-layout selection: narrow projections / wide downstream access).
pub struct RowLayout {
    schema: Schema,
    field_offsets: Vec<usize>,
    row_size: usize,
}

impl RowLayout {
    pub fn new(schema: Schema) -> Self {
        let mut offset = 0;
        let field_offsets = schema
            .fields
            .iter()
            .map(|f| {
                let current = offset;
                offset += f.data_type.byte_size();
                current
            })
            .collect();
        let row_size = offset;
        Self { schema, field_offsets, row_size }
    }

    pub fn row_size(&self) -> usize {
        self.row_size
    }

    pub fn capacity(&self, buffer: &TupleBuffer) -> usize {
        if self.row_size == 0 {
            0
        } else {
            buffer.size() / self.row_size
        }
    }

    fn field_byte_range(&self, record: usize, field_idx: usize) -> (usize, usize) {
        let size = self.schema.fields[field_idx].data_type.byte_size();
        let start = record * self.row_size + self.field_offsets[field_idx];
        (start, start + size)
    }
}

impl MemoryLayout for RowLayout {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn read_field(&self, buffer: &TupleBuffer, record: usize, field_idx: usize) -> Result<Value> {
        check_bounds(buffer, record)?;
        let field = self.schema.fields.get(field_idx).ok_or_else(|| {
            crate::error::NebulaError::Validation(format!("field index {field_idx} out of range"))
        })?;
        let data_type = field.data_type;
        let (start, end) = self.field_byte_range(record, field_idx);
        Ok(buffer.with_bytes(|bytes| Value::read_bytes(data_type, &bytes[start..end])))
    }

    fn write_field(&self, buffer: &TupleBuffer, record: usize, field_idx: usize, value: Value) -> Result<()> {
        check_field_type(&self.schema, field_idx, &value)?;
        let (start, end) = self.field_byte_range(record, field_idx);
        buffer.with_bytes_mut(|bytes| value.write_bytes(&mut bytes[start..end]));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPool;
    use crate::layout::tests::test_schema;

    #[test]
    fn round_trips_typed_fields() {
        let layout = RowLayout::new(test_schema());
        let pool = BufferPool::new(layout.row_size() * 4, 1);
        let buffer = pool.get_buffer_blocking().unwrap();
        layout.append_record(&buffer, &[Value::Int64(7), Value::Float32(1.5)]).unwrap();
        assert_eq!(layout.read_field(&buffer, 0, 0).unwrap(), Value::Int64(7));
        assert_eq!(layout.read_field(&buffer, 0, 1).unwrap(), Value::Float32(1.5));
    }

    #[test]
    fn out_of_bounds_record_is_rejected() {
        let layout = RowLayout::new(test_schema());
        let pool = BufferPool::new(layout.row_size() * 4, 1);
        let buffer = pool.get_buffer_blocking().unwrap();
        let err = layout.read_field(&buffer, 0, 0).unwrap_err();
        assert!(matches!(err, crate::error::NebulaError::OutOfBounds { .. }));
    }

    #[test]
    fn wrong_static_type_is_rejected() {
        let layout = RowLayout::new(test_schema());
        let pool = BufferPool::new(layout.row_size() * 4, 1);
        let buffer = pool.get_buffer_blocking().unwrap();
        let err = layout.write_field(&buffer, 0, 0, Value::Float32(1.0)).unwrap_err();
        assert!(matches!(err, crate::error::NebulaError::FieldTypeMismatch { .. }));
    }

    #[test]
    fn char_field_round_trips_without_panicking() {
        use crate::common::{DataType, Field};
        let schema = Schema::new(vec![Field::new("name", DataType::Char(8))]);
        let layout = RowLayout::new(schema);
        let pool = BufferPool::new(layout.row_size() * 4, 1);
        let buffer = pool.get_buffer_blocking().unwrap();

        layout.append_record(&buffer, &[Value::Char("hi".into())]).unwrap();
        assert_eq!(layout.read_field(&buffer, 0, 0).unwrap(), Value::Char("hi".into()));
    }

    #[test]
    fn char_field_rejects_strings_longer_than_declared_width() {
        use crate::common::{DataType, Field};
        let schema = Schema::new(vec![Field::new("name", DataType::Char(4))]);
        let layout = RowLayout::new(schema);
        let pool = BufferPool::new(layout.row_size() * 4, 1);
        let buffer = pool.get_buffer_blocking().unwrap();

        let err = layout.write_field(&buffer, 0, 0, Value::Char("toolong".into())).unwrap_err();
        assert!(matches!(err, crate::error::NebulaError::FieldTypeMismatch { .. }));
    }
}
