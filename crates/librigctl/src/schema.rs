use std::collections::HashSet;

use rigctl_protocol::{FieldSnapshot, FieldSpec};

use crate::error::SchemaError;

/// Ordered set of telemetry fields a rig exposes.
///
/// Order is configuration order and is preserved in every snapshot, since
/// front ends index fields by position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSchema {
    specs: Vec<FieldSpec>,
}

impl FieldSchema {
    pub fn new(specs: Vec<FieldSpec>) -> Result<Self, SchemaError> {
        let mut seen = HashSet::with_capacity(specs.len());
        for (index, spec) in specs.iter().enumerate() {
            if spec.id.is_empty() {
                return Err(SchemaError::EmptyFieldId(index));
            }
            if !seen.insert(spec.id.as_str()) {
                return Err(SchemaError::DuplicateField(spec.id.clone()));
            }
        }
        Ok(Self { specs })
    }

    pub fn specs(&self) -> &[FieldSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Fresh field values, each at its kind's zero value.
    pub fn build_fields(&self) -> Vec<FieldSnapshot> {
        self.specs.iter().map(FieldSnapshot::zeroed).collect()
    }

    /// Write each kind's zero value back into `fields` in place. `fields`
    /// must come from [`FieldSchema::build_fields`] on this schema.
    pub fn reset(&self, fields: &mut [FieldSnapshot]) {
        for (spec, field) in self.specs.iter().zip(fields.iter_mut()) {
            field.value = spec.kind.default_value();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigctl_protocol::FieldValue;

    #[test]
    fn build_fields_preserves_order_and_defaults() {
        let schema = FieldSchema::new(vec![
            FieldSpec::new("t", "Temp", "float"),
            FieldSpec::new("r", "RPM", "int"),
            FieldSpec::new("s", "Stage", "string"),
            FieldSpec::new("x", "Extra", "matrix"),
        ])
        .unwrap();

        let fields = schema.build_fields();
        let ids: Vec<_> = fields.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["t", "r", "s", "x"]);
        assert_eq!(fields[0].value, FieldValue::Real(0.0));
        assert_eq!(fields[1].value, FieldValue::Integer(0));
        assert_eq!(fields[2].value, FieldValue::Text(String::new()));
        assert_eq!(fields[3].value, FieldValue::Absent);
    }

    #[test]
    fn reset_restores_zero_values_in_place() {
        let schema = FieldSchema::new(vec![
            FieldSpec::new("t", "Temp", "float"),
            FieldSpec::new("r", "RPM", "int"),
            FieldSpec::new("s", "Stage", "string"),
            FieldSpec::new("x", "Extra", "matrix"),
        ])
        .unwrap();
        let mut fields = schema.build_fields();
        fields[0].value = FieldValue::Real(115.7);
        fields[1].value = FieldValue::Integer(1542);
        fields[2].value = FieldValue::Text("soak".to_string());

        schema.reset(&mut fields);

        assert_eq!(fields, schema.build_fields());
        assert_eq!(fields[2].id, "s");
        assert_eq!(fields[2].value, FieldValue::Text(String::new()));
        assert_eq!(fields[3].value, FieldValue::Absent);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = FieldSchema::new(vec![
            FieldSpec::new("t", "Temp", "float"),
            FieldSpec::new("t", "Temp again", "int"),
        ])
        .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateField("t".to_string()));
    }

    #[test]
    fn empty_ids_are_rejected() {
        let err = FieldSchema::new(vec![FieldSpec::new("", "Nameless", "int")]).unwrap_err();
        assert_eq!(err, SchemaError::EmptyFieldId(0));
    }

    #[test]
    fn empty_schema_builds_no_fields() {
        let schema = FieldSchema::new(Vec::new()).unwrap();
        assert!(schema.is_empty());
        assert!(schema.build_fields().is_empty());
    }
}
