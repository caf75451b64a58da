//! Name-addressable schema snapshots
//!
//! A [`FieldMap`] turns a record source's positional schema into a lookup by name. Dotted
//! names (`"Address.City"`) become nested sub-maps so composite members can be resolved
//! recursively.

use crate::core::error::{MappingError, Result};
use crate::core::field_type::FieldType;
use crate::core::record::RecordSchema;
use std::collections::HashMap;
use std::fmt;

/// Separator between path segments of a nested field name
pub const NAME_SEPARATOR: char = '.';

/// Location and declared type of a single field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldMapItem {
    /// Zero-based position in the record
    pub ordinal: usize,
    /// Declared type
    pub field_type: FieldType,
    /// Provider-specific declared type, tried when `field_type` has no conversion
    pub provider_specific_type: Option<FieldType>,
    /// Whether the field may hold nulls
    pub nullable: bool,
}

impl fmt::Display for FieldMapItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}", self.ordinal, self.field_type)?;
        if self.nullable {
            f.write_str("?")?;
        }
        f.write_str(")")
    }
}

/// Field names of a record schema, nested on `.`
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    fields: HashMap<String, FieldMapItem>,
    sub_maps: HashMap<String, FieldMap>,
}

impl FieldMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the map for a record schema, registering fields in ordinal order
    ///
    /// # Errors
    ///
    /// Returns error if a name repeats or is used both as a leaf and as a prefix
    pub fn create<S: RecordSchema + ?Sized>(schema: &S) -> Result<Self> {
        let mut map = FieldMap::new();
        for ordinal in 0..schema.field_count() {
            map.add(
                schema.field_name(ordinal),
                FieldMapItem {
                    ordinal,
                    field_type: schema.field_type(ordinal),
                    provider_specific_type: schema.provider_specific_field_type(ordinal),
                    nullable: schema.is_nullable(ordinal),
                },
            )?;
        }
        Ok(map)
    }

    /// Register a field under a possibly dotted name
    ///
    /// # Errors
    ///
    /// Returns error if the name repeats or conflicts with an existing leaf or prefix
    pub fn add(&mut self, name: &str, item: FieldMapItem) -> Result<()> {
        let mut target = self;
        let mut segments = name.split(NAME_SEPARATOR).peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                if target.sub_maps.contains_key(segment) {
                    return Err(MappingError::FieldConflict(name.to_string()));
                }
                if target.fields.contains_key(segment) {
                    return Err(MappingError::DuplicateField(name.to_string()));
                }
                target.fields.insert(segment.to_string(), item);
                return Ok(());
            }
            if target.fields.contains_key(segment) {
                return Err(MappingError::FieldConflict(name.to_string()));
            }
            target = target.sub_maps.entry(segment.to_string()).or_default();
        }
        Ok(())
    }

    /// Leaf field registered under exactly `name`
    pub fn try_get_ordinal(&self, name: &str) -> Option<&FieldMapItem> {
        self.fields.get(name)
    }

    /// Nested map registered under the prefix `name`
    pub fn try_get_sub_map(&self, name: &str) -> Option<&FieldMap> {
        self.sub_maps.get(name)
    }

    /// Smallest ordinal among the leaves of this map and all nested maps
    pub fn min_ordinal(&self) -> Option<usize> {
        let own = self.fields.values().map(|item| item.ordinal).min();
        let nested = self.sub_maps.values().filter_map(FieldMap::min_ordinal).min();
        match (own, nested) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Number of leaves, including nested ones
    pub fn len(&self) -> usize {
        self.fields.len() + self.sub_maps.values().map(FieldMap::len).sum::<usize>()
    }

    /// Whether the map has no leaves
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::Column;
    use crate::core::record_set::RecordSet;

    fn item(ordinal: usize, field_type: FieldType) -> FieldMapItem {
        FieldMapItem {
            ordinal,
            field_type,
            provider_specific_type: None,
            nullable: false,
        }
    }

    #[test]
    fn test_create_from_schema() {
        let records = RecordSet::new(vec![
            Column::new("Id", FieldType::Long),
            Column::nullable("Address.City", FieldType::String),
            Column::new("Address.Geo.Lat", FieldType::Double)
                .with_provider_specific_type(FieldType::Object),
        ]);
        let map = FieldMap::create(&records).unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(map.try_get_ordinal("Id").map(|x| x.ordinal), Some(0));
        assert!(map.try_get_ordinal("Address").is_none());
        assert!(map.try_get_ordinal("Address.City").is_none());

        let address = map.try_get_sub_map("Address").unwrap();
        let city = address.try_get_ordinal("City").unwrap();
        assert_eq!(city.ordinal, 1);
        assert!(city.nullable);

        let lat = address
            .try_get_sub_map("Geo")
            .and_then(|geo| geo.try_get_ordinal("Lat"))
            .unwrap();
        assert_eq!(lat.provider_specific_type, Some(FieldType::Object));
        assert!(map.try_get_sub_map("Id").is_none());
    }

    #[test]
    fn test_min_ordinal_includes_nested_maps() {
        let mut map = FieldMap::new();
        map.add("Outer.Inner.Value", item(1, FieldType::Int)).unwrap();
        map.add("Outer.Other", item(4, FieldType::Int)).unwrap();
        map.add("First", item(0, FieldType::Int)).unwrap();

        assert_eq!(map.min_ordinal(), Some(0));
        assert_eq!(map.try_get_sub_map("Outer").unwrap().min_ordinal(), Some(1));
        assert_eq!(FieldMap::new().min_ordinal(), None);
    }

    #[test]
    fn test_duplicate_field_is_rejected() {
        let mut map = FieldMap::new();
        map.add("Value", item(0, FieldType::Int)).unwrap();
        assert!(matches!(
            map.add("Value", item(1, FieldType::Int)),
            Err(MappingError::DuplicateField(_))
        ));
    }

    #[test]
    fn test_leaf_and_prefix_conflict() {
        let mut map = FieldMap::new();
        map.add("Value", item(0, FieldType::Int)).unwrap();
        assert!(matches!(
            map.add("Value.Value", item(1, FieldType::Int)),
            Err(MappingError::FieldConflict(_))
        ));

        let mut map = FieldMap::new();
        map.add("Value.Value", item(0, FieldType::Int)).unwrap();
        assert!(matches!(
            map.add("Value", item(1, FieldType::Int)),
            Err(MappingError::FieldConflict(_))
        ));
    }

    #[test]
    fn test_item_display() {
        let mut nullable = item(2, FieldType::String);
        nullable.nullable = true;
        assert_eq!(nullable.to_string(), "(2, string?)");
        assert_eq!(item(0, FieldType::Int).to_string(), "(0, int)");
    }
}
