use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::invokable::Invokable;
use crate::signature::Signature;
use crate::value::Value;

static NEXT_SHAPE_ID: AtomicU64 = AtomicU64::new(0);

/// Layout token for the instances of a class.
///
/// A class has exactly one latest shape. Adding an instance field retires it;
/// instances still pointing at a retired shape must migrate before their
/// sends can be cached again, and a retired shape resolves no methods.
pub struct Shape {
    id: u64,
    class: Weak<Class>,
    field_count: usize,
    latest: AtomicBool,
}

impl Shape {
    fn new(class: Weak<Class>, field_count: usize) -> Self {
        Self {
            id: NEXT_SHAPE_ID.fetch_add(1, Ordering::Relaxed),
            class,
            field_count,
            latest: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn field_count(&self) -> usize {
        self.field_count
    }

    pub fn is_latest(&self) -> bool {
        self.latest.load(Ordering::Acquire)
    }

    pub fn class(&self) -> Option<Arc<Class>> {
        self.class.upgrade()
    }

    pub fn lookup_invokable(&self, signature: &Signature) -> Option<Invokable> {
        if !self.is_latest() {
            return None;
        }
        self.class()?.lookup_invokable(signature)
    }

    fn retire(&self) {
        self.latest.store(false, Ordering::Release);
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shape")
            .field("id", &self.id)
            .field("field_count", &self.field_count)
            .field("latest", &self.is_latest())
            .finish()
    }
}

pub struct Class {
    name: Signature,
    superclass: Option<Arc<Class>>,
    methods: RwLock<HashMap<Signature, Invokable>>,
    fields: RwLock<Vec<Signature>>,
    layout: RwLock<Arc<Shape>>,
    /// Number of method lookups answered, for diagnostics.
    lookups: AtomicU64,
}

impl Class {
    /// Creates a class inheriting its superclass's instance fields.
    pub fn new(name: Signature, superclass: Option<Arc<Class>>) -> Arc<Class> {
        let fields = superclass.as_ref().map(|s| s.fields.read().clone()).unwrap_or_default();
        Arc::new_cyclic(|this| {
            let shape = Arc::new(Shape::new(this.clone(), fields.len()));
            Class {
                name,
                superclass,
                methods: RwLock::new(HashMap::new()),
                fields: RwLock::new(fields),
                layout: RwLock::new(shape),
                lookups: AtomicU64::new(0),
            }
        })
    }

    pub fn name(&self) -> &Signature {
        &self.name
    }

    pub fn superclass(&self) -> Option<&Arc<Class>> {
        self.superclass.as_ref()
    }

    /// Installs a method or primitive under its own signature, making this
    /// class the holder of compiled methods.
    pub fn add_invokable(self: &Arc<Self>, invokable: Invokable) {
        if let Invokable::Method(method) = &invokable {
            method.set_holder(self);
        }
        let signature = invokable.signature().clone();
        self.methods.write().insert(signature, invokable);
    }

    pub fn local_invokable(&self, signature: &Signature) -> Option<Invokable> {
        self.methods.read().get(signature).cloned()
    }

    /// Resolves `signature` along the superclass chain.
    pub fn lookup_invokable(&self, signature: &Signature) -> Option<Invokable> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let mut class = Some(self);
        while let Some(c) = class {
            if let Some(found) = c.local_invokable(signature) {
                return Some(found);
            }
            class = c.superclass.as_deref();
        }
        None
    }

    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    pub fn instance_shape(&self) -> Arc<Shape> {
        self.layout.read().clone()
    }

    pub fn number_of_instance_fields(&self) -> usize {
        self.fields.read().len()
    }

    pub fn field_index(&self, name: &Signature) -> Option<usize> {
        self.fields.read().iter().position(|f| f == name)
    }

    /// Appends an instance field and retires the current shape.
    pub fn add_instance_field(self: &Arc<Self>, name: Signature) -> Arc<Shape> {
        let mut fields = self.fields.write();
        fields.push(name);
        let shape = Arc::new(Shape::new(Arc::downgrade(self), fields.len()));
        let old = std::mem::replace(&mut *self.layout.write(), shape.clone());
        old.retire();
        log::trace!(
            "{}: shape {} retired, now {} with {} fields",
            self.name,
            old.id(),
            shape.id(),
            shape.field_count()
        );
        shape
    }

    pub fn new_instance(self: &Arc<Self>) -> Arc<Instance> {
        let shape = self.instance_shape();
        let fields = vec![Value::Nil; shape.field_count()];
        Arc::new(Instance {
            class: self.clone(),
            shape: RwLock::new(shape),
            fields: RwLock::new(fields),
        })
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Class({})", self.name)
    }
}

/// An instance of a user-defined class.
pub struct Instance {
    class: Arc<Class>,
    shape: RwLock<Arc<Shape>>,
    fields: RwLock<Vec<Value>>,
}

impl Instance {
    pub fn class(&self) -> &Arc<Class> {
        &self.class
    }

    pub fn shape(&self) -> Arc<Shape> {
        self.shape.read().clone()
    }

    /// Adopts the class's latest shape, growing field storage to match.
    pub fn migrate(&self) -> Arc<Shape> {
        let latest = self.class.instance_shape();
        let mut shape = self.shape.write();
        if !Arc::ptr_eq(&shape, &latest) {
            let mut fields = self.fields.write();
            if fields.len() < latest.field_count() {
                fields.resize(latest.field_count(), Value::Nil);
            }
            log::trace!("instance of {} migrated to shape {}", self.class.name(), latest.id());
            *shape = latest.clone();
        }
        latest
    }

    pub fn field(&self, index: usize) -> Option<Value> {
        if let Some(v) = self.fields.read().get(index) {
            return Some(v.clone());
        }
        // The class may have grown since this instance was created.
        if index < self.class.number_of_instance_fields() {
            self.migrate();
            return self.fields.read().get(index).cloned();
        }
        None
    }

    pub fn set_field(&self, index: usize, value: Value) -> bool {
        if index >= self.fields.read().len() {
            if index >= self.class.number_of_instance_fields() {
                return false;
            }
            self.migrate();
        }
        match self.fields.write().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}
