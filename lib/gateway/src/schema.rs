use ahash::HashMap;

/// Shape of a list field's items: whether a single item may be null without
/// invalidating the whole list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListShape {
    pub item_non_null: bool,
}

/// What the authorization engine needs to know about one schema field:
/// the named output type, whether the field may be null, and the list shape
/// when the field yields a list.
#[derive(Debug, Clone)]
pub struct FieldShape {
    pub output_type_name: String,
    pub non_null: bool,
    pub list: Option<ListShape>,
}

impl FieldShape {
    pub fn new(output_type_name: impl Into<String>) -> Self {
        Self {
            output_type_name: output_type_name.into(),
            non_null: false,
            list: None,
        }
    }

    pub fn non_null(mut self) -> Self {
        self.non_null = true;
        self
    }

    /// Marks the field as a list. `item_non_null` mirrors `[T!]` vs `[T]`.
    pub fn list_of(mut self, item_non_null: bool) -> Self {
        self.list = Some(ListShape { item_non_null });
        self
    }
}

/// Field-shape metadata per (type name, field name), supplied by schema
/// tooling when a schema version loads and immutable afterwards.
#[derive(Debug, Default)]
pub struct ResponseSchema {
    type_fields: HashMap<String, HashMap<String, FieldShape>>,
}

impl ResponseSchema {
    pub fn add_field(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        shape: FieldShape,
    ) -> &mut Self {
        self.type_fields
            .entry(type_name.into())
            .or_default()
            .insert(field_name.into(), shape);
        self
    }

    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldShape> {
        self.type_fields
            .get(type_name)
            .and_then(|fields| fields.get(field_name))
    }
}
