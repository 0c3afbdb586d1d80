use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::assembler::Assembled;
use crate::invokable::{Invokable, Primitive, PrimitiveFn};
use crate::object::{Class, Shape};
use crate::primitives::{self, PrimitiveDesc};
use crate::signature::{Signature, SymbolTable};
use crate::value::Value;

/// Classes the interpreters need to name directly.
pub struct CoreClasses {
    pub object: Arc<Class>,
    pub class: Arc<Class>,
    pub nil: Arc<Class>,
    pub true_class: Arc<Class>,
    pub false_class: Arc<Class>,
    pub integer: Arc<Class>,
    pub double: Arc<Class>,
    pub string: Arc<Class>,
    pub symbol: Arc<Class>,
    pub array: Arc<Class>,
    pub block: Arc<Class>,
    pub method: Arc<Class>,
}

/// Selectors the runtime sends on its own behalf.
pub struct CoreSelectors {
    pub does_not_understand: Signature,
    pub escaped_block: Signature,
    pub unknown_global: Signature,
}

/// Symbols, globals and the bootstrapped class hierarchy shared by every
/// interpreter.
pub struct Universe {
    symbols: SymbolTable,
    globals: RwLock<HashMap<Signature, Value>>,
    /// Native bodies by `(class name, selector)`, for binding primitive
    /// declarations on install.
    natives: HashMap<(Signature, Signature), PrimitiveFn>,
    classes: CoreClasses,
    selectors: CoreSelectors,
}

impl Universe {
    pub fn bootstrap() -> Arc<Universe> {
        Self::with_primitives(&primitives::default_primitives())
    }

    pub fn with_primitives(table: &[PrimitiveDesc]) -> Arc<Universe> {
        let symbols = SymbolTable::new();
        let object = Class::new(symbols.intern("Object"), None);
        let subclass = |name: &str| Class::new(symbols.intern(name), Some(object.clone()));
        let classes = CoreClasses {
            class: subclass("Class"),
            nil: subclass("Nil"),
            true_class: subclass("True"),
            false_class: subclass("False"),
            integer: subclass("Integer"),
            double: subclass("Double"),
            string: subclass("String"),
            symbol: subclass("Symbol"),
            array: subclass("Array"),
            block: subclass("Block"),
            method: subclass("Method"),
            object: object.clone(),
        };
        let selectors = CoreSelectors {
            does_not_understand: symbols.intern("doesNotUnderstand:arguments:"),
            escaped_block: symbols.intern("escapedBlock:"),
            unknown_global: symbols.intern("unknownGlobal:"),
        };

        let mut natives = HashMap::new();
        for desc in table {
            natives.insert(
                (symbols.intern(desc.class), symbols.intern(desc.selector)),
                desc.func,
            );
        }

        let universe = Universe {
            symbols,
            globals: RwLock::new(HashMap::new()),
            natives,
            classes,
            selectors,
        };

        for class in universe.core_class_list() {
            universe.set_global(class.name().clone(), Value::Class(class.clone()));
        }
        universe.set_global(universe.symbol_for("nil"), Value::Nil);
        universe.set_global(universe.symbol_for("true"), Value::True);
        universe.set_global(universe.symbol_for("false"), Value::False);

        for desc in table {
            let Some(Value::Class(class)) = universe.get_global(&universe.symbol_for(desc.class))
            else {
                log::warn!("primitive {}>>#{} names no class", desc.class, desc.selector);
                continue;
            };
            let primitive = Primitive::new(universe.symbol_for(desc.selector), desc.func);
            class.add_invokable(Invokable::Primitive(Arc::new(primitive)));
        }
        log::debug!(
            "universe bootstrapped: {} primitives, {} symbols",
            table.len(),
            universe.symbols.len()
        );
        Arc::new(universe)
    }

    fn core_class_list(&self) -> [&Arc<Class>; 12] {
        let c = &self.classes;
        [
            &c.object,
            &c.class,
            &c.nil,
            &c.true_class,
            &c.false_class,
            &c.integer,
            &c.double,
            &c.string,
            &c.symbol,
            &c.array,
            &c.block,
            &c.method,
        ]
    }

    pub fn symbol_for(&self, name: &str) -> Signature {
        self.symbols.intern(name)
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn get_global(&self, name: &Signature) -> Option<Value> {
        self.globals.read().get(name).cloned()
    }

    pub fn set_global(&self, name: Signature, value: Value) {
        self.globals.write().insert(name, value);
    }

    pub fn has_global(&self, name: &Signature) -> bool {
        self.globals.read().contains_key(name)
    }

    pub fn classes(&self) -> &CoreClasses {
        &self.classes
    }

    pub fn selectors(&self) -> &CoreSelectors {
        &self.selectors
    }

    /// Creates a class and registers it as a global. Classes without an
    /// explicit superclass inherit from Object.
    pub fn new_class(&self, name: &str, superclass: Option<&Arc<Class>>) -> Arc<Class> {
        let superclass = superclass.unwrap_or(&self.classes.object).clone();
        let class = Class::new(self.symbol_for(name), Some(superclass));
        self.set_global(class.name().clone(), Value::Class(class.clone()));
        class
    }

    /// Installs an assembled method. A primitive declaration gets its native
    /// body bound when the table has one for this class and selector.
    pub fn install(&self, class: &Arc<Class>, assembled: Assembled) {
        let invokable = match assembled {
            Assembled::Primitive(declared) if declared.is_empty() => {
                let key = (class.name().clone(), declared.signature().clone());
                match self.natives.get(&key) {
                    Some(&func) => Invokable::Primitive(Arc::new(Primitive::new(
                        declared.signature().clone(),
                        func,
                    ))),
                    None => {
                        log::debug!(
                            "{}>>#{} declared primitive without a native body",
                            class.name(),
                            declared.signature()
                        );
                        Invokable::Primitive(declared)
                    }
                }
            }
            other => other.into_invokable(),
        };
        class.add_invokable(invokable);
    }

    pub fn class_of(&self, value: &Value) -> Arc<Class> {
        let c = &self.classes;
        match value {
            Value::Nil => c.nil.clone(),
            Value::True => c.true_class.clone(),
            Value::False => c.false_class.clone(),
            Value::Integer(_) | Value::BigInteger(_) => c.integer.clone(),
            Value::Double(_) => c.double.clone(),
            Value::Symbol(_) => c.symbol.clone(),
            Value::String(_) => c.string.clone(),
            Value::Array(_) => c.array.clone(),
            Value::Block(_) => c.block.clone(),
            Value::Object(instance) => instance.class().clone(),
            Value::Class(_) => c.class.clone(),
        }
    }

    /// Instances carry their own shape. Every other value reports the
    /// current instance shape of its class.
    pub fn shape_of(&self, value: &Value) -> Arc<Shape> {
        match value {
            Value::Object(instance) => instance.shape(),
            other => self.class_of(other).instance_shape(),
        }
    }
}
