//! Bounded numeric array userdata for Lua scripts.
//!
//! Exposes a fixed-size `f64` buffer to Lua as the global `array` namespace:
//! `array.new(n)` allocates a zero-filled array, `array(v1, ..., vN)` builds
//! one from a variadic value list, and the resulting userdata supports
//! 1-based indexing (`arr[i]`, `arr[i] = v`) and the length operator (`#arr`)
//! through its metatable. All reads and writes are bounds-checked.

use mlua::{
    Lua, MetaMethod, Result as LuaResult, Table, UserData, UserDataMethods, Value, Variadic,
};
use thiserror::Error;

/// Maximum element count a constructor will allocate.
///
/// The backing buffer lives on the Rust heap, outside the Lua allocator, so
/// the engine's script memory limit cannot account for it. The cap keeps a
/// sandboxed script from forcing unbounded host allocation.
pub const MAX_LEN: usize = 1 << 24;

/// Errors raised by array accessors and constructors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ArrayError {
    /// 1-based index outside `[1, len]`.
    #[error("index {index} out of range (array length is {len})")]
    OutOfRange { index: i64, len: usize },

    /// Requested length exceeds [`MAX_LEN`].
    #[error("array length {requested} exceeds the maximum of {max} elements", max = MAX_LEN)]
    TooLarge { requested: usize },
}

/// Fixed-size array of `f64` values with 1-based, bounds-checked access.
///
/// The element count is fixed at construction; the boxed slice cannot grow.
#[derive(Debug, Clone, PartialEq)]
pub struct NumArray {
    data: Box<[f64]>,
}

impl NumArray {
    /// Create a zero-filled array of `len` elements.
    pub fn zeroed(len: usize) -> Result<Self, ArrayError> {
        if len > MAX_LEN {
            return Err(ArrayError::TooLarge { requested: len });
        }
        Ok(Self {
            data: vec![0.0; len].into_boxed_slice(),
        })
    }

    /// Create an array holding the given values, in order.
    pub fn from_values(values: Vec<f64>) -> Result<Self, ArrayError> {
        if values.len() > MAX_LEN {
            return Err(ArrayError::TooLarge {
                requested: values.len(),
            });
        }
        Ok(Self {
            data: values.into_boxed_slice(),
        })
    }

    /// Element count, fixed at construction.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Map a 1-based index to a slot in the backing storage.
    fn slot(&self, index: i64) -> Result<usize, ArrayError> {
        if index < 1 || index as u64 > self.data.len() as u64 {
            return Err(ArrayError::OutOfRange {
                index,
                len: self.data.len(),
            });
        }
        Ok((index - 1) as usize)
    }

    /// Read the value at 1-based `index`.
    pub fn get(&self, index: i64) -> Result<f64, ArrayError> {
        Ok(self.data[self.slot(index)?])
    }

    /// Write `value` at 1-based `index`. The bounds check precedes the
    /// write; on failure the array is unchanged.
    pub fn set(&mut self, index: i64, value: f64) -> Result<(), ArrayError> {
        let slot = self.slot(index)?;
        self.data[slot] = value;
        Ok(())
    }
}

impl std::fmt::Display for NumArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Truncate long arrays so print() stays readable.
        const SHOWN: usize = 8;
        write!(f, "array[")?;
        for (i, v) in self.data.iter().take(SHOWN).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        if self.data.len() > SHOWN {
            write!(f, ", ...")?;
        }
        write!(f, "]")
    }
}

impl UserData for NumArray {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        // arr[i]
        methods.add_meta_method(MetaMethod::Index, |_, this, index: i64| {
            this.get(index).map_err(mlua::Error::external)
        });

        // arr[i] = v
        methods.add_meta_method_mut(
            MetaMethod::NewIndex,
            |_, this, (index, value): (i64, f64)| {
                this.set(index, value).map_err(mlua::Error::external)
            },
        );

        // #arr
        methods.add_meta_method(MetaMethod::Len, |_, this, ()| Ok(this.len() as i64));

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.to_string()));
    }
}

/// Borrow a value as a `NumArray` and read its length, or fail with an
/// "expected an array" argument error.
fn check_array_len(value: &Value, fname: &str) -> LuaResult<usize> {
    value
        .as_userdata()
        .and_then(|ud| ud.borrow::<NumArray>().ok())
        .map(|arr| arr.len())
        .ok_or_else(|| {
            mlua::Error::RuntimeError(format!("bad argument #1 to '{fname}': expected an array"))
        })
}

/// Install the `array` namespace into the Lua globals.
///
/// The namespace carries `new` and `size`, and its own metatable binds
/// `__call` to the variadic constructor so `array(1, 2, 3)` works.
pub fn install(lua: &Lua) -> LuaResult<()> {
    let namespace = lua.create_table()?;

    // array.new(size) -> zero-filled array
    let new_fn = lua.create_function(|_, size: i64| {
        if size < 0 {
            return Err(mlua::Error::RuntimeError(format!(
                "bad argument #1 to 'new': size must be non-negative (got {size})"
            )));
        }
        NumArray::zeroed(size as usize).map_err(mlua::Error::external)
    })?;
    namespace.set("new", new_fn)?;

    // array.size(a) -> element count, function form of #a
    let size_fn = lua.create_function(|_, value: Value| {
        check_array_len(&value, "size").map(|len| len as i64)
    })?;
    namespace.set("size", size_fn)?;

    // array(v1, ..., vN) -> array of the given values; the namespace's own
    // metatable routes call syntax here. Arguments are checked left to
    // right, so the first bad one is the one reported.
    let make_fn = lua.create_function(|lua, (_ns, values): (Table, Variadic<Value>)| {
        let mut data = Vec::with_capacity(values.len());
        for (i, value) in values.into_iter().enumerate() {
            let n = lua
                .coerce_number(value)
                .ok()
                .flatten()
                .ok_or_else(|| {
                    mlua::Error::RuntimeError(format!(
                        "bad argument #{} to 'array': value must be a number",
                        i + 1
                    ))
                })?;
            data.push(n);
        }
        NumArray::from_values(data).map_err(mlua::Error::external)
    })?;

    let meta = lua.create_table()?;
    meta.set(MetaMethod::Call.name(), make_fn)?;
    namespace.set_metatable(Some(meta));

    lua.globals().set("array", namespace)?;

    Ok(())
}
