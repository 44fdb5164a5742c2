use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// `(id Utf8, vector FixedSizeList<Float32, dim>)`. Nothing but the key and
/// the vector: text and timing live in the catalog.
pub fn build_vector_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
    ]))
}
