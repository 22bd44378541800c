#![deny(bare_trait_objects)]
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]
#![warn(unused_import_braces)]
#![warn(unused_qualifications)]
#![warn(unused_results)]
//
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    // clippy::cargo
)]
//
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
//
#![allow(clippy::similar_names)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::shadow_unrelated)]
//
#![allow(clippy::use_self)]
#![allow(clippy::new_without_default)]

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

#[macro_use]
pub mod macros;

pub mod cipher;
pub mod dex;
pub mod gadget;
pub mod placement;
pub mod range;
pub mod register;
pub mod render;
pub mod table;

#[cfg(test)]
mod test_util;

pub use render::AsEscape;
pub use table::{generate_table, GenerateError, GeneratedTable, TableConfig};
