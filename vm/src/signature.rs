use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;

struct SignatureInner {
    name: Box<str>,
    arity: u8,
}

/// An interned selector or symbol.
///
/// Signatures are created through a [`SymbolTable`], so two signatures with
/// the same text are the same allocation and compare by pointer.
#[derive(Clone)]
pub struct Signature(Arc<SignatureInner>);

impl Signature {
    fn new(name: &str) -> Self {
        Self(Arc::new(SignatureInner { name: name.into(), arity: arity_of(name) }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Number of stack entries a send of this selector consumes, receiver
    /// included.
    pub fn arity(&self) -> u8 {
        self.0.arity
    }

    pub fn argument_count(&self) -> usize {
        self.0.arity as usize - 1
    }
}

fn arity_of(name: &str) -> u8 {
    let Some(first) = name.chars().next() else {
        return 1;
    };
    if !(first.is_alphabetic() || first == '_') {
        // Binary operator.
        return 2;
    }
    let colons = name.bytes().filter(|&b| b == b':').count();
    (colons + 1).min(u8::MAX as usize) as u8
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Signature {}

impl Hash for Signature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0.name)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// Interning table for [`Signature`]s.
#[derive(Default)]
pub struct SymbolTable {
    symbols: RwLock<HashMap<Box<str>, Signature>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, name: &str) -> Signature {
        if let Some(sig) = self.symbols.read().get(name) {
            return sig.clone();
        }
        let mut symbols = self.symbols.write();
        symbols.entry(name.into()).or_insert_with(|| Signature::new(name)).clone()
    }

    pub fn len(&self) -> usize {
        self.symbols.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_counts_receiver() {
        let table = SymbolTable::new();
        assert_eq!(table.intern("size").arity(), 1);
        assert_eq!(table.intern("+").arity(), 2);
        assert_eq!(table.intern("<=").arity(), 2);
        assert_eq!(table.intern("at:").arity(), 2);
        assert_eq!(table.intern("at:put:").arity(), 3);
        assert_eq!(table.intern("a:b:c:d:").arity(), 5);
        assert_eq!(table.intern("at:put:").argument_count(), 2);
    }

    #[test]
    fn interning_is_by_identity() {
        let table = SymbolTable::new();
        let a = table.intern("value:");
        let b = table.intern("value:");
        let other = SymbolTable::new().intern("value:");
        assert_eq!(a, b);
        assert_ne!(a, other);
        assert_eq!(table.len(), 1);
    }
}
