//! Pure-text MySQL DDL rewriting for mysql-clone.
//!
//! Create-statements read from one server cannot always be replayed on
//! another: they embed the original `DEFINER` account, versioned
//! conditional comments and schema-qualified references. This crate holds
//! the text-to-text transforms that make them portable.
//!
//! # Structure
//!
//! - `transform`: the individual transforms and the [`Pipeline`] that
//!   applies them in a fixed order
//! - `trigger`: reconstruction of `CREATE TRIGGER` from catalog fields
//! - `ident`: identifier quoting
//!
//! # Example
//!
//! ```rust
//! use mysql_ddl::Pipeline;
//!
//! let pipeline = Pipeline::for_destination(Some(("shop", "shop_copy")));
//! let sql = pipeline.apply(
//!     "CREATE DEFINER=`root`@`%` PROCEDURE `p`() SELECT * FROM `shop`.`orders`",
//! );
//! assert_eq!(sql, "CREATE PROCEDURE `p`() SELECT * FROM `shop_copy`.`orders`");
//! ```

pub mod ident;
pub mod transform;
pub mod trigger;

pub use ident::quote_ident;
pub use transform::{
    EnsureLeadingKeyword, Pipeline, RenameSchema, StripDefiner, StripVersionedComments,
    Transform,
};
pub use trigger::TriggerParts;
