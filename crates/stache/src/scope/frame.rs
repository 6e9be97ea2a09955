//! RAII scope frame for automatic pop on exit

use super::Scopes;
use crate::value::Value;

/// Guard that pops the scope it pushed when dropped.
///
/// Section iteration and partial inclusion push through a frame so that an
/// early return with `?` still leaves the stack balanced.
///
/// # Example
///
/// ```
/// use stache::{Scopes, Value};
///
/// let mut scopes = Scopes::new();
/// {
///     let frame = scopes.frame(Value::Int(1));
///     assert_eq!(frame.top(), Some(&Value::Int(1)));
/// }
/// // frame dropped, value popped
/// assert!(scopes.is_empty());
/// ```
pub struct ScopeFrame<'a> {
    scopes: &'a mut Scopes,
}

impl Scopes {
    /// Push `value` now and pop it when the returned frame drops.
    pub fn frame(&mut self, value: Value) -> ScopeFrame<'_> {
        self.push(value);
        ScopeFrame { scopes: self }
    }
}

impl<'a> Drop for ScopeFrame<'a> {
    fn drop(&mut self) {
        self.scopes.pop();
    }
}

impl<'a> std::ops::Deref for ScopeFrame<'a> {
    type Target = Scopes;

    fn deref(&self) -> &Self::Target {
        self.scopes
    }
}

impl<'a> std::ops::DerefMut for ScopeFrame<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.scopes
    }
}
