// Not every test target uses every helper.
#![allow(dead_code)]

pub mod mem_addresser;
