use super::{check_bounds, check_field_type, MemoryLayout, Value};
use crate::buffer::TupleBuffer;
use crate::common::Schema;
use crate::error::Result;

/// Column-major layout: each field occupies its own contiguous run across
/// all records. Favored for wide scans touching few columns
/// (`SPEC_FULL.md` §4.11 memory-layout selection).
pub struct ColumnLayout {
    schema: Schema,
    column_capacity: usize,
    column_offsets: Vec<usize>,
}

impl ColumnLayout {
    /// `column_capacity` is the maximum number of records one buffer holds
    /// under this layout; it must be fixed up front since column byte
    /// ranges depend on it.
    pub fn new(schema: Schema, column_capacity: usize) -> Self {
        let mut offset = 0;
        let column_offsets = schema
            .fields
            .iter()
            .map(|f| {
                let current = offset;
                offset += f.data_type.byte_size() * column_capacity;
                current
            })
            .collect();
        Self { schema, column_capacity, column_offsets }
    }

    pub fn column_capacity(&self) -> usize {
        self.column_capacity
    }

    pub fn required_buffer_size(&self) -> usize {
        self.schema
            .fields
            .iter()
            .map(|f| f.data_type.byte_size() * self.column_capacity)
            .sum()
    }

    fn field_byte_range(&self, record: usize, field_idx: usize) -> (usize, usize) {
        let size = self.schema.fields[field_idx].data_type.byte_size();
        let start = self.column_offsets[field_idx] + record * size;
        (start, start + size)
    }
}

impl MemoryLayout for ColumnLayout {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn read_field(&self, buffer: &TupleBuffer, record: usize, field_idx: usize) -> Result<Value> {
        check_bounds(buffer, record)?;
        let data_type = self
            .schema
            .fields
            .get(field_idx)
            .ok_or_else(|| crate::error::NebulaError::Validation(format!("field index {field_idx} out of range")))?
            .data_type;
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
    fn columns_do_not_alias_across_fields() {
        let layout = ColumnLayout::new(test_schema(), 4);
        let pool = BufferPool::new(layout.required_buffer_size(), 1);
        let buffer = pool.get_buffer_blocking().unwrap();
        layout.append_record(&buffer, &[Value::Int64(1), Value::Float32(2.0)]).unwrap();
        layout.append_record(&buffer, &[Value::Int64(2), Value::Float32(4.0)]).unwrap();
        assert_eq!(layout.read_field(&buffer, 0, 0).unwrap(), Value::Int64(1));
        assert_eq!(layout.read_field(&buffer, 1, 0).unwrap(), Value::Int64(2));
        assert_eq!(layout.read_field(&buffer, 0, 1).unwrap(), Value::Float32(2.0));
        assert_eq!(layout.read_field(&buffer, 1, 1).unwrap(), Value::Float32(4.0));
    }

    #[test]
    fn char_field_round_trips_without_panicking() {
        use crate::common::{DataType, Field};
        let schema = Schema::new(vec![Field::new("name", DataType::Char(8))]);
        let layout = ColumnLayout::new(schema, 4);
        let pool = BufferPool::new(layout.required_buffer_size(), 1);
        let buffer = pool.get_buffer_blocking().unwrap();

        layout.append_record(&buffer, &[Value::Char("hi".into())]).unwrap();
        assert_eq!(layout.read_field(&buffer, 0, 0).unwrap(), Value::Char("hi".into()));
    }
}
