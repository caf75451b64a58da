//! Record converters
//!
//! A [`DataRecordConverter`] owns a converter plan and compiles it on first use. The typed
//! wrappers downcast its output: [`TypedConverter`] for target types and selectors,
//! [`Trampoline`] for argument binding ahead of a caller-supplied closure.

use super::expr::{CompiledFn, Expr};
use super::selector::{ArgumentList, Selector};
use super::shape::{downcast, AnyValue};
use crate::core::error::Result;
use crate::core::record::DataRecord;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

/// A converter plan plus its lazily compiled closure
pub struct DataRecordConverter {
    expression: Expr,
    compiled: OnceLock<CompiledFn>,
}

impl DataRecordConverter {
    /// Wrap a plan; compilation happens on first use
    pub fn new(expression: Expr) -> Self {
        Self {
            expression,
            compiled: OnceLock::new(),
        }
    }

    /// The plan this converter evaluates
    pub fn expression(&self) -> &Expr {
        &self.expression
    }

    /// The compiled closure; the same `Arc` on every call
    pub fn compiled(&self) -> CompiledFn {
        Arc::clone(self.compiled.get_or_init(|| self.expression.compile()))
    }

    /// Whether the plan has been compiled yet
    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    /// Evaluate the converter against the current row
    pub fn convert_any(&self, record: &dyn DataRecord) -> Result<AnyValue> {
        (self.compiled.get_or_init(|| self.expression.compile()))(record)
    }
}

impl fmt::Display for DataRecordConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x => {}", self.expression)
    }
}

impl fmt::Debug for DataRecordConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataRecordConverter")
            .field("expression", &self.expression)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

/// A converter producing `T`
pub struct TypedConverter<T> {
    converter: Arc<DataRecordConverter>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> TypedConverter<T> {
    pub(crate) fn new(converter: Arc<DataRecordConverter>) -> Self {
        Self {
            converter,
            _marker: PhantomData,
        }
    }

    /// Convert the row `record` is positioned on
    pub fn convert(&self, record: &dyn DataRecord) -> Result<T> {
        downcast::<T>(self.converter.convert_any(record)?)
    }

    /// The shared untyped converter
    pub fn inner(&self) -> &Arc<DataRecordConverter> {
        &self.converter
    }

    /// The compiled closure
    pub fn compiled(&self) -> CompiledFn {
        self.converter.compiled()
    }

    /// The plan this converter evaluates
    pub fn expression(&self) -> &Expr {
        self.converter.expression()
    }
}

impl<T> Clone for TypedConverter<T> {
    fn clone(&self) -> Self {
        Self {
            converter: Arc::clone(&self.converter),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for TypedConverter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.converter, f)
    }
}

/// Binds `Args` from a record and forwards them to a caller-supplied closure
pub struct Trampoline<Args> {
    converter: Arc<DataRecordConverter>,
    _marker: PhantomData<fn() -> Args>,
}

impl<Args: ArgumentList> Trampoline<Args> {
    pub(crate) fn new(converter: Arc<DataRecordConverter>) -> Self {
        Self {
            converter,
            _marker: PhantomData,
        }
    }

    /// Bind the arguments for the current row
    pub fn arguments(&self, record: &dyn DataRecord) -> Result<Args> {
        let values = downcast::<Vec<AnyValue>>(self.converter.convert_any(record)?)?;
        Args::from_values(values)
    }

    /// Bind the arguments for the current row and call `f` with them
    pub fn invoke<F: Selector<Args>>(&self, record: &dyn DataRecord, f: &F) -> Result<F::Output> {
        Ok(f.call(self.arguments(record)?))
    }

    /// The shared untyped converter
    pub fn inner(&self) -> &Arc<DataRecordConverter> {
        &self.converter
    }
}

impl<Args> Clone for Trampoline<Args> {
    fn clone(&self) -> Self {
        Self {
            converter: Arc::clone(&self.converter),
            _marker: PhantomData,
        }
    }
}

impl<Args> fmt::Debug for Trampoline<Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.converter, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field_type::FieldType;
    use crate::core::record::{Column, DataReader};
    use crate::core::record_set::RecordSet;
    use crate::core::value::DatabaseValue;

    fn read_int() -> Expr {
        Expr::ReadField {
            member: "value".to_string(),
            ordinal: 0,
            field_type: FieldType::Int,
        }
    }

    #[test]
    fn test_compiles_once() {
        let converter = DataRecordConverter::new(read_int());
        assert!(!converter.is_compiled());
        let first = converter.compiled();
        assert!(converter.is_compiled());
        assert!(Arc::ptr_eq(&first, &converter.compiled()));
        assert_eq!(converter.to_string(), "x => x.get_int(0)");
    }

    #[test]
    fn test_typed_and_trampoline() {
        let mut records = RecordSet::new(vec![Column::new("value", FieldType::Int)])
            .with_row([DatabaseValue::Int(21)])
            .unwrap();
        records.advance().unwrap();

        let typed = TypedConverter::<i32>::new(Arc::new(DataRecordConverter::new(read_int())));
        assert_eq!(typed.convert(&records).unwrap(), 21);
        assert!(TypedConverter::<i64>::new(Arc::clone(typed.inner()))
            .convert(&records)
            .is_err());

        let trampoline = Trampoline::<(i32, i32)>::new(Arc::new(DataRecordConverter::new(
            Expr::Arguments(vec![read_int(), read_int()]),
        )));
        assert_eq!(trampoline.arguments(&records).unwrap(), (21, 21));
        assert_eq!(trampoline.invoke(&records, &|a: i32, b: i32| a + b).unwrap(), 42);
    }
}
