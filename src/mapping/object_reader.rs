//! Row-by-row object reading
//!
//! [`ObjectReader`] drives a [`DataReader`] and converts every row with a converter from
//! its [`ConverterFactory`].

use super::converter::TypedConverter;
use super::factory::{CacheMode, ConverterFactory};
use super::selector::{ArgumentList, Selector};
use super::shape::Mappable;
use crate::core::error::Result;
use crate::core::record::{DataReader, DataRecord};

/// Reads typed objects from a record reader
///
/// # Example
///
/// ```rust
/// use rust_record_mapper::prelude::*;
///
/// # fn main() -> Result<()> {
/// let records = RecordSet::new(vec![Column::new("Value", FieldType::Int)])
///     .with_row([1])?
///     .with_row([2])?;
///
/// let mut reader = ObjectReader::for_reader(records);
/// let values = reader.read_mapped(&["Value"], |v: i32| v * 10)?;
/// assert_eq!(values, vec![10, 20]);
/// # Ok(())
/// # }
/// ```
pub struct ObjectReader<R> {
    reader: R,
    factory: ConverterFactory,
}

impl<R: DataReader + 'static> ObjectReader<R> {
    /// Read from `reader` with a private, uncached factory
    pub fn for_reader(reader: R) -> Self {
        Self {
            reader,
            factory: ConverterFactory::builder()
                .with_cache_mode(CacheMode::Disabled)
                .build(),
        }
    }

    /// Read from `reader` using converters from `factory`
    pub fn with_factory(reader: R, factory: ConverterFactory) -> Self {
        Self { reader, factory }
    }

    /// Add a custom conversion
    ///
    /// The reader switches to a private, uncached factory holding the current conversions
    /// plus this one, so a shared cache never sees converters built with it.
    pub fn with_converter<F, T, C>(self, convert: C) -> Self
    where
        F: 'static,
        T: Mappable,
        C: Fn(F) -> T + Send + Sync + 'static,
    {
        let factory = ConverterFactory::builder()
            .with_conversions(self.factory.conversions())
            .with_conversion(convert)
            .with_cache_mode(CacheMode::Disabled)
            .build();
        Self {
            reader: self.reader,
            factory,
        }
    }

    /// The factory converters come from
    pub fn factory(&self) -> &ConverterFactory {
        &self.factory
    }

    /// Give back the underlying reader
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Iterate the remaining rows as `T`
    ///
    /// # Errors
    ///
    /// Returns error if no converter to `T` can be built for the reader's schema
    pub fn read<T: Mappable>(&mut self) -> Result<Rows<'_, R, T>> {
        let converter = self.factory.get_converter::<R, T>(&self.reader)?;
        Ok(Rows::new(
            &mut self.reader,
            Box::new(move |record: &dyn DataRecord| converter.convert(record)),
        ))
    }

    /// Convert every remaining row to `T` and pass it to `f`, returning the row count
    ///
    /// # Errors
    ///
    /// Returns the first build, read or conversion error
    pub fn read_with<T, F>(&mut self, mut f: F) -> Result<usize>
    where
        T: Mappable,
        F: FnMut(T),
    {
        let converter: TypedConverter<T> = self.factory.get_converter::<R, T>(&self.reader)?;
        let mut count = 0;
        while self.reader.advance()? {
            f(converter.convert(&self.reader)?);
            count += 1;
        }
        Ok(count)
    }

    /// Iterate the remaining rows as argument tuples bound by `names`
    ///
    /// # Errors
    ///
    /// Returns error if a name cannot be resolved against the reader's schema
    pub fn read_arguments<Args: ArgumentList>(&mut self, names: &[&str]) -> Result<Rows<'_, R, Args>> {
        let trampoline = self.factory.get_trampoline::<R, Args>(&self.reader, names)?;
        Ok(Rows::new(
            &mut self.reader,
            Box::new(move |record: &dyn DataRecord| trampoline.arguments(record)),
        ))
    }

    /// Call `f` for every remaining row with arguments bound by `names`, collecting results
    ///
    /// # Errors
    ///
    /// Returns the first build, read or conversion error
    pub fn read_mapped<Args, F>(&mut self, names: &[&str], f: F) -> Result<Vec<F::Output>>
    where
        Args: ArgumentList,
        F: Selector<Args>,
    {
        let trampoline = self.factory.get_trampoline::<R, Args>(&self.reader, names)?;
        let mut results = Vec::new();
        while self.reader.advance()? {
            results.push(trampoline.invoke(&self.reader, &f)?);
        }
        Ok(results)
    }
}

type RowFn<'a, T> = Box<dyn Fn(&dyn DataRecord) -> Result<T> + 'a>;

/// Iterator over converted rows; stops after the first reader error
pub struct Rows<'a, R, T> {
    reader: &'a mut R,
    convert: RowFn<'a, T>,
    done: bool,
}

impl<'a, R: DataReader, T> Rows<'a, R, T> {
    fn new(reader: &'a mut R, convert: RowFn<'a, T>) -> Self {
        Self {
            reader,
            convert,
            done: false,
        }
    }
}

impl<R: DataReader, T> Iterator for Rows<'_, R, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.advance() {
            Ok(true) => Some((self.convert)(&*self.reader)),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field_type::FieldType;
    use crate::core::record::Column;
    use crate::core::record_set::RecordSet;
    use crate::core::value::DatabaseValue;
    use crate::mapping::shape::{Shape, TargetType};

    #[derive(Default, Debug, PartialEq)]
    struct Migration {
        id: i64,
        context: String,
        name: String,
    }

    impl Mappable for Migration {
        fn target_type() -> TargetType {
            TargetType::composite::<Migration>(|| {
                Shape::builder::<Migration>()
                    .default_constructor()
                    .member("Id", |m: &mut Migration, v: i64| m.id = v)
                    .member("Context", |m: &mut Migration, v: String| m.context = v)
                    .member("Name", |m: &mut Migration, v: String| m.name = v)
                    .build()
            })
        }
    }

    fn migrations() -> RecordSet {
        RecordSet::new(vec![
            Column::new("Id", FieldType::Long),
            Column::nullable("Context", FieldType::String),
            Column::nullable("Name", FieldType::String),
        ])
        .with_row([DatabaseValue::Long(1), "".into(), "First".into()])
        .unwrap()
        .with_row([DatabaseValue::Long(2), DatabaseValue::Null, "Second".into()])
        .unwrap()
    }

    #[test]
    fn test_converts_all_rows() {
        let mut reader = ObjectReader::for_reader(migrations());
        let rows: Vec<Migration> = reader.read::<Migration>().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[1],
            Migration {
                id: 2,
                context: String::new(),
                name: "Second".to_string()
            }
        );
    }

    #[test]
    fn test_read_with_counts_rows() {
        let mut names = Vec::new();
        let count = ObjectReader::for_reader(migrations())
            .read_with(|m: Migration| names.push(m.name))
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[test]
    fn test_with_converter() {
        let records = RecordSet::new(vec![Column::new("Value", FieldType::Int)])
            .with_row([7])
            .unwrap();
        let mut reader = ObjectReader::for_reader(records).with_converter(|x: i32| x.to_string());
        let values: Vec<(String,)> = reader
            .read_arguments::<(String,)>(&["Value"])
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(values, vec![("7".to_string(),)]);
    }

    #[test]
    fn test_read_mapped() {
        let mut reader = ObjectReader::for_reader(migrations());
        let labels = reader
            .read_mapped(&["Id", "Name"], |id: i64, name: String| format!("{}-{}", id, name))
            .unwrap();
        assert_eq!(labels, vec!["1-First", "2-Second"]);
    }

    #[test]
    fn test_build_error_surfaces_before_reading() {
        let mut reader = ObjectReader::for_reader(migrations());
        assert!(reader.read_arguments::<(i32,)>(&["Missing"]).is_err());
        assert_eq!(reader.read::<Migration>().unwrap().count(), 2);
    }
}
