//! Models: plain data holders with service-backed instance methods.

pub mod base;
pub mod binding;
pub mod definition;

pub use base::{Decorate, Model};
pub use binding::{ModelInstance, ModelSpec};
pub use definition::{
    AndThen, AndThenFn, ConstructorRef, LocalMethod, MethodBinding, MethodTarget, ModelDefinition,
    ModelFactory, ServiceRef,
};
