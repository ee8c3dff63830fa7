//! Compile tag-and-field queries into predicates over records, and filter
//! JSON Lines streams with them.
//!
//! ```
//! use serde_json::json;
//! use tagsieve::dsl::Compiler;
//!
//! let predicate = Compiler::new().compile("fan, .rating >= 4").unwrap();
//! let story = json!({ "tags": "fantasy,adventure", "rating": 4.5 });
//! assert_eq!(predicate.test(&story), Ok(true));
//! ```

pub mod config;
pub mod dsl;
pub mod pipeline;
pub mod records;
pub mod sinks;
pub mod utils;
