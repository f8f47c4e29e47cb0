//! Payment domain

pub mod entity;
pub mod repository;
pub mod service;

pub use entity::{Payment, PaymentMethod, PaymentReceipt};
pub use repository::PaymentRepository;
pub use service::PaymentService;
