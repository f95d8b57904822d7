#![allow(dead_code)]
#![allow(unused_imports)]

pub mod builders;
pub mod strategies;

pub use builders::*;
pub use strategies::*;
