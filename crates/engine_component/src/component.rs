//! Core [`Component`] trait, component type identity, and type-erased instances.
//!
//! Component types are not derived from Rust types. A [`ComponentType`] is an
//! opaque number handed out by a [`ComponentTypeAllocator`] at setup time, and
//! any value implementing [`Component`] can be attached under it. The
//! capability check happens at compile time on `attach`; reading a value back
//! out is a checked downcast on the [`ComponentInstance`].

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A unique identifier for a kind of component.
///
/// Issued by [`ComponentTypeAllocator::allocate`]; stable and unique for the
/// lifetime of the allocator. [`ComponentType::NONE`] is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentType(pub u64);

impl ComponentType {
    /// The "no component" sentinel.
    pub const NONE: ComponentType = ComponentType(0);

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// Returns `true` unless this is [`ComponentType::NONE`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ComponentType({})", self.0)
    }
}

/// Hands out [`ComponentType`] identifiers from a single shared counter.
#[derive(Debug, Default)]
pub struct ComponentTypeAllocator {
    last_id: AtomicU64,
}

impl ComponentTypeAllocator {
    /// Creates a new allocator. The first identifier issued is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_id: AtomicU64::new(0),
        }
    }

    /// Allocates a never-before-issued component type.
    pub fn allocate(&self) -> ComponentType {
        ComponentType(self.last_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Returns the number of component types issued so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.last_id.load(Ordering::Relaxed)
    }
}

/// The core component trait.
///
/// Anything attached to an entity must implement this trait. Components are
/// shared between systems running on different threads, so they must be
/// `Send + Sync + 'static`; state that systems mutate in place lives behind
/// interior mutability inside the component.
///
/// # Examples
///
/// ```rust
/// use engine_component::Component;
///
/// #[derive(Debug)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {}
/// ```
pub trait Component: Any + Send + Sync {
    /// A human-readable name for this component, used in logs.
    fn type_name() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }
}

/// A component value tagged with the type it was attached under.
///
/// Instances are cheap to clone: the value itself is shared.
#[derive(Clone)]
pub struct ComponentInstance {
    component_type: ComponentType,
    name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl ComponentInstance {
    /// Wrap a component value under the given type.
    #[must_use]
    pub fn new<C: Component>(component_type: ComponentType, value: C) -> Self {
        Self {
            component_type,
            name: C::type_name(),
            value: Arc::new(value),
        }
    }

    /// The component type this instance was attached under.
    #[must_use]
    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    /// The Rust-side name of the stored value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.name
    }

    /// Borrow the value as `C`, or `None` if it holds something else.
    #[must_use]
    pub fn downcast_ref<C: Component>(&self) -> Option<&C> {
        self.value.downcast_ref::<C>()
    }

    /// Get a shared handle to the value as `C`, or `None` if it holds
    /// something else.
    #[must_use]
    pub fn downcast<C: Component>(&self) -> Option<Arc<C>> {
        Arc::clone(&self.value).downcast::<C>().ok()
    }

    /// Returns `true` if both instances share the same underlying value.
    #[must_use]
    pub fn ptr_eq(&self, other: &ComponentInstance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl std::fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("component_type", &self.component_type)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
