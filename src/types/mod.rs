//! 类型模块：批量请求引擎的核心数据类型。
//!
//! # Types Module
//!
//! Core data types flowing through the batch engine.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Item`] | One unit of work: ordered field → scalar mapping |
//! | [`ResultRecord`] | Normalized outcome of one dispatched request |
//! | [`Payload`] | JSON body, text body, status code, or recorded failure |
//! | [`Batch`] | Records of one completed chunk |
//!
//! ## Example
//!
//! ```rust
//! use batch_fetch::types::{Item, Payload, ResultRecord};
//!
//! let item = Item::new().with("user_id", "u1").with("amount", 12.5);
//! assert_eq!(item.get_text("amount").as_deref(), Some("12.5"));
//!
//! let record = ResultRecord::new("https://api.example.com/users/u1", Payload::Status(404));
//! assert!(!record.is_success());
//! ```

pub mod batch;
pub mod item;
pub mod record;

pub use batch::Batch;
pub use item::{scalar_text, Item};
pub use record::{Failure, FailureKind, Payload, ResultRecord};
