#![doc = include_str!("../README.md")]
#![no_std]
#![deny(
    unsafe_code,
    unused_imports,
    unused_variables,
    unused_must_use,
    missing_docs,
    clippy::all,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented
)]
#![allow(clippy::just_underscores_and_digits, clippy::len_without_is_empty)]

extern crate alloc;

mod utils;
pub(crate) use utils::helper;

mod error;
pub use error::{Error, Violation};

mod rb_tree;
pub use rb_tree::{DuplicatePolicy, Iter, NodeRef, RbTree, Removal};

mod median_tracker;
pub use median_tracker::{Median, MedianTracker};

mod ops;
pub use ops::Op;
