//! Проверка формы данных обработчика структурированного хаба.
//!
//! Структурированный хаб отдаёт обработчику каноническое сообщение
//! (словарь строка → значение), поэтому параметр данных обработчика должен
//! десериализоваться либо как словарь, либо как запись (структура).
//! Проверка выполняется при подписке: `T::deserialize` вызывается на
//! специальном десериализаторе, который запоминает, какой метод запросил
//! тип, и сразу прекращает разбор.

use std::fmt;

use serde::{
    de::{self, DeserializeOwned, Visitor},
    Deserializer,
};

use crate::HubError;

/// Форма, в которой тип просит себя десериализовать.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataShape {
    /// Словарь (`deserialize_map`), например `serde_json::Map` или `HashMap`.
    Map,
    /// Запись (`deserialize_struct`).
    Record,
    /// Всё остальное: скаляры, строки, последовательности, `Option`,
    /// нетипизированный `serde_json::Value`.
    Other(&'static str),
}

/// Определяет форму типа `T`.
pub fn data_shape<T: DeserializeOwned>() -> DataShape {
    match T::deserialize(ShapeProbe) {
        Err(Probe(shape)) => shape,
        Ok(_) => DataShape::Other("unit"),
    }
}

/// Проверяет, что `T` годится как параметр данных обработчика.
pub fn validate_handler_data<T: DeserializeOwned>() -> Result<DataShape, HubError> {
    match data_shape::<T>() {
        shape @ (DataShape::Map | DataShape::Record) => Ok(shape),
        DataShape::Other(kind) => Err(HubError::InvalidHandler(format!(
            "data parameter `{}` deserializes as {kind}, expected a record or a keyed map",
            std::any::type_name::<T>()
        ))),
    }
}

/// Ошибка-носитель найденной формы.
#[derive(Debug)]
struct Probe(DataShape);

impl fmt::Display for Probe {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "shape probe: {:?}", self.0)
    }
}

impl std::error::Error for Probe {}

impl de::Error for Probe {
    fn custom<M: fmt::Display>(_msg: M) -> Self {
        Probe(DataShape::Other("custom"))
    }
}

struct ShapeProbe;

macro_rules! reject {
    ($($method:ident => $kind:literal,)*) => {
        $(
            fn $method<V: Visitor<'de>>(
                self,
                _visitor: V,
            ) -> Result<V::Value, Probe> {
                Err(Probe(DataShape::Other($kind)))
            }
        )*
    };
}

impl<'de> Deserializer<'de> for ShapeProbe {
    type Error = Probe;

    fn deserialize_any<V: Visitor<'de>>(
        self,
        _visitor: V,
    ) -> Result<V::Value, Probe> {
        Err(Probe(DataShape::Other("any")))
    }

    fn deserialize_map<V: Visitor<'de>>(
        self,
        _visitor: V,
    ) -> Result<V::Value, Probe> {
        Err(Probe(DataShape::Map))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Probe> {
        Err(Probe(DataShape::Record))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Probe> {
        Err(Probe(DataShape::Other("enum")))
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, Probe> {
        Err(Probe(DataShape::Other("newtype struct")))
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _visitor: V,
    ) -> Result<V::Value, Probe> {
        Err(Probe(DataShape::Other("unit struct")))
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, Probe> {
        Err(Probe(DataShape::Other("tuple")))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        _visitor: V,
    ) -> Result<V::Value, Probe> {
        Err(Probe(DataShape::Other("tuple struct")))
    }

    reject! {
        deserialize_bool => "bool",
        deserialize_i8 => "integer",
        deserialize_i16 => "integer",
        deserialize_i32 => "integer",
        deserialize_i64 => "integer",
        deserialize_i128 => "integer",
        deserialize_u8 => "integer",
        deserialize_u16 => "integer",
        deserialize_u32 => "integer",
        deserialize_u64 => "integer",
        deserialize_u128 => "integer",
        deserialize_f32 => "float",
        deserialize_f64 => "float",
        deserialize_char => "char",
        deserialize_str => "string",
        deserialize_string => "string",
        deserialize_bytes => "bytes",
        deserialize_byte_buf => "bytes",
        deserialize_option => "option",
        deserialize_unit => "unit",
        deserialize_seq => "sequence",
        deserialize_identifier => "identifier",
        deserialize_ignored_any => "ignored",
    }
}
