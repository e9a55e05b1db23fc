// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod connector;
pub mod error;
pub mod field;
pub mod form;
pub mod memory;
pub mod model;
pub mod proxy;
pub mod query;
pub mod record;
pub mod related;
pub mod role;
pub mod signal;
pub mod store;
pub mod table;
pub mod toolbar;
pub mod value;

pub use connector::*;
pub use error::*;
pub use field::*;
pub use form::*;
pub use memory::*;
pub use model::*;
pub use proxy::*;
pub use query::*;
pub use record::*;
pub use related::*;
pub use role::*;
pub use signal::*;
pub use store::*;
pub use table::*;
pub use toolbar::*;
pub use value::*;

/// Single-threaded shared ownership used by views bound to one model.
pub type Shared<T> = std::rc::Rc<std::cell::RefCell<T>>;

pub fn shared<T>(value: T) -> Shared<T> {
    std::rc::Rc::new(std::cell::RefCell::new(value))
}
