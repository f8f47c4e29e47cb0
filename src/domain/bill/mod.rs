//! Bill lifecycle domain

pub mod entity;
pub mod repository;
pub mod service;

pub use entity::{whole_units, Bill, BillStatus, CustomerBills, MonthWindow};
pub use repository::BillRepository;
pub use service::BillService;
