//! Customer account domain

pub mod entity;
pub mod repository;
pub mod service;

pub use entity::{Address, ConnectionType, Customer, NewCustomer};
pub use repository::CustomerRepository;
pub use service::CustomerService;
